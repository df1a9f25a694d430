/// Content type for a published artifact, derived from its filename.
///
/// Downstream DASH players rely on the manifest and segment types; anything
/// unrecognized is served as opaque bytes.
pub fn content_type_for(filename: &str) -> &'static str {
    if filename == "manifest.mpd" || filename.ends_with(".mpd") {
        "application/dash+xml"
    } else if filename.ends_with(".m4s") {
        "video/iso.segment"
    } else if filename.ends_with(".jpg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_content_types() {
        assert_eq!(content_type_for("manifest.mpd"), "application/dash+xml");
        assert_eq!(content_type_for("init-0.m4s"), "video/iso.segment");
        assert_eq!(content_type_for("chunk-0-00001.m4s"), "video/iso.segment");
        assert_eq!(content_type_for("thumbnail.jpg"), "image/jpeg");
        assert_eq!(content_type_for("notes.txt"), "application/octet-stream");
    }
}

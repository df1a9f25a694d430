use serde::{Deserialize, Serialize};

/// One unit of ingest work: transcode the raw upload for `video_id` into
/// DASH artifacts and publish them. Serialized as JSON on the job queue;
/// any body that does not parse into this shape is poison and is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingJob {
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub filename: String,
}

impl ProcessingJob {
    pub fn new(video_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            filename: filename.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_uses_camel_case_wire_names() {
        let job = ProcessingJob::new("demo", "demo.mp4");
        let body = job.to_json().unwrap();
        assert_eq!(body, r#"{"videoId":"demo","filename":"demo.mp4"}"#);
        assert_eq!(ProcessingJob::from_json(&body).unwrap(), job);
    }

    #[test]
    fn malformed_bodies_are_poison() {
        assert!(ProcessingJob::from_json("not-json").is_err());
        assert!(ProcessingJob::from_json(r#"{"videoId":"x"}"#).is_err());
        assert!(ProcessingJob::from_json(r#"{"id":"x","file":"y"}"#).is_err());
    }
}

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{
    DownloadLink, EmbeddingReply, FaceIdsReply, FaceVerdict, ImageAnalysis, RemoteFunctions,
    Reply, ANALYZE_IMAGE, DETECT_FACES, EMBED_TEXT, EXTRACT_FACE_EMBEDDING,
    GENERATE_DOWNLOAD_LINK, VERIFY_FACE_ACCESS,
};
use crate::config::FunctionsConfig;
use crate::error::ServiceError;

/// Remote functions reached over HTTP at `<endpoint>/<function-name>`.
pub struct HttpFunctions {
    endpoint: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl HttpFunctions {
    pub fn new(config: &FunctionsConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            agent,
        }
    }

    fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        function: &'static str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let url = format!("{}/{}", self.endpoint, function);
        debug!(function, %url, "Calling remote function");

        let mut req = self.agent.post(&url).set("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            req = req.set("Authorization", &format!("Bearer {}", api_key));
        }

        let (status, response) = match req.send_json(body) {
            Ok(response) => (response.status(), response),
            Err(ureq::Error::Status(status, response)) => (status, response),
            Err(ureq::Error::Transport(e)) => {
                return Err(ServiceError::Transport {
                    function,
                    message: e.to_string(),
                });
            }
        };

        let body = response.into_string().map_err(|e| ServiceError::Transport {
            function,
            message: format!("failed to read reply: {}", e),
        })?;

        decode_reply(function, status, &body)
    }
}

/// Decode a reply body. Error statuses without a readable `{error}` body
/// still surface as `Rejected`.
fn decode_reply<T: DeserializeOwned>(
    function: &'static str,
    status: u16,
    body: &str,
) -> Result<T, ServiceError> {
    match serde_json::from_str::<Reply<T>>(body) {
        Ok(Reply::Data(_)) if status >= 400 => Err(ServiceError::Rejected {
            function,
            status,
            message: format!("HTTP {}", status),
        }),
        Ok(reply) => reply.into_result(function, status),
        Err(_) if status >= 400 => Err(ServiceError::Rejected {
            function,
            status,
            message: truncate(body, 200),
        }),
        Err(e) => Err(ServiceError::Malformed {
            function,
            message: e.to_string(),
        }),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

impl RemoteFunctions for HttpFunctions {
    fn analyze_image(&self, image_url: &str) -> Result<ImageAnalysis, ServiceError> {
        self.call(ANALYZE_IMAGE, &json!({ "imageUrl": image_url }))
    }

    fn detect_faces(&self, image_url: &str) -> Result<Vec<String>, ServiceError> {
        let reply: FaceIdsReply = self.call(DETECT_FACES, &json!({ "imageUrl": image_url }))?;
        Ok(reply.face_ids)
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let reply: EmbeddingReply = self.call(EMBED_TEXT, &json!({ "text": text }))?;
        Ok(reply.embedding)
    }

    fn extract_face_embedding(&self, image_url: &str) -> Result<Vec<f32>, ServiceError> {
        let reply: EmbeddingReply =
            self.call(EXTRACT_FACE_EMBEDDING, &json!({ "imageUrl": image_url }))?;
        Ok(reply.embedding)
    }

    fn verify_face_access(
        &self,
        selfie_url: &str,
        event_id: &str,
    ) -> Result<FaceVerdict, ServiceError> {
        self.call(
            VERIFY_FACE_ACCESS,
            &json!({ "selfieImageUrl": selfie_url, "eventId": event_id }),
        )
    }

    fn prepare_download(&self, event_id: &str) -> Result<DownloadLink, ServiceError> {
        self.call(GENERATE_DOWNLOAD_LINK, &json!({ "eventId": event_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_status_without_json() {
        let result: Result<EmbeddingReply, _> =
            decode_reply(EMBED_TEXT, 502, "<html>Bad Gateway</html>");
        match result {
            Err(ServiceError::Rejected { status, message, .. }) => {
                assert_eq!(status, 502);
                assert!(message.contains("Bad Gateway"));
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.embedding)),
        }
    }

    #[test]
    fn test_decode_garbage_on_success_is_malformed() {
        let result: Result<FaceIdsReply, _> = decode_reply(DETECT_FACES, 200, "not json");
        assert!(matches!(result, Err(ServiceError::Malformed { .. })));
    }

    #[test]
    fn test_decode_face_ids() {
        let reply: FaceIdsReply =
            decode_reply(DETECT_FACES, 200, r#"{"faceIds":["f1","f2"]}"#).unwrap();
        assert_eq!(reply.face_ids, vec!["f1", "f2"]);
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let functions = HttpFunctions::new(&FunctionsConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            api_key: Some("secret".to_string()),
            timeout_secs: 2,
            embedding_dim: 3,
        });

        assert!(matches!(
            functions.embed_text("sunset"),
            Err(ServiceError::Transport { .. })
        ));
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::speech::{
    RecognitionError, RecognitionSink, RecognizerConfig, RecognizerFactory, SpeechRecognizer,
};

/// 音声認識が使えない環境用。生成は常に Unsupported で失敗する。
pub struct UnsupportedRecognizerFactory {
    reason: String,
}

impl UnsupportedRecognizerFactory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RecognizerFactory for UnsupportedRecognizerFactory {
    async fn create(
        &self,
        _config: RecognizerConfig,
        _sink: RecognitionSink,
    ) -> Result<Arc<dyn SpeechRecognizer>, RecognitionError> {
        Err(RecognitionError::unsupported(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unsupported"
    }
}

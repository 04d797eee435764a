use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::domain::speech::{
    EndReason, RecognitionError, RecognitionSink, RecognizerConfig, RecognizerFactory,
    SpeechRecognizer,
};

/// テストやデモ用の認識器ファクトリ。
/// 生成された認識器を `ScriptedPlatform` 経由で外から操作できる。
pub struct ScriptedRecognizerFactory {
    platform: Arc<ScriptedPlatform>,
    creations: AtomicUsize,
    fail_with: Option<RecognitionError>,
    gate: Option<Arc<Semaphore>>,
}

/// プラットフォーム側の振る舞い（イベント発火と呼び出し記録）
#[derive(Default)]
pub struct ScriptedPlatform {
    sink: Mutex<Option<RecognitionSink>>,
    config: Mutex<Option<RecognizerConfig>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    aborts: AtomicUsize,
    end_on_stop: Mutex<bool>,
}

impl ScriptedRecognizerFactory {
    pub fn new() -> Self {
        let platform = ScriptedPlatform {
            end_on_stop: Mutex::new(true),
            ..Default::default()
        };
        Self {
            platform: Arc::new(platform),
            creations: AtomicUsize::new(0),
            fail_with: None,
            gate: None,
        }
    }

    /// 生成を常に失敗させる
    pub fn failing(error: RecognitionError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new()
        }
    }

    /// 生成完了前に gate の permit を待つ（初期化中の競合を再現する）
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn platform(&self) -> Arc<ScriptedPlatform> {
        self.platform.clone()
    }

    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedRecognizerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPlatform {
    /// 途中結果を通知
    pub fn interim(&self, transcript: &str) {
        if let Some(sink) = self.sink() {
            sink.interim(transcript);
        }
    }

    /// 終了を通知（無音タイムアウト等）
    pub fn end(&self, reason: EndReason) {
        if let Some(sink) = self.sink() {
            sink.ended(reason);
        }
    }

    pub fn error(&self, error: RecognitionError) {
        if let Some(sink) = self.sink() {
            sink.error(error);
        }
    }

    /// false にすると stop() で終了通知を出さない
    pub fn set_end_on_stop(&self, value: bool) {
        *self.end_on_stop.lock() = value;
    }

    pub fn config(&self) -> Option<RecognizerConfig> {
        self.config.lock().clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        self.sink().is_some_and(|s| s.is_attached())
    }

    fn sink(&self) -> Option<RecognitionSink> {
        self.sink.lock().clone()
    }
}

struct ScriptedRecognizer {
    platform: Arc<ScriptedPlatform>,
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&self) -> Result<(), RecognitionError> {
        self.platform.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.platform.stops.fetch_add(1, Ordering::SeqCst);
        let end_on_stop = *self.platform.end_on_stop.lock();
        if end_on_stop {
            self.platform.end(EndReason::StopRequested);
        }
    }

    fn abort(&self) {
        self.platform.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecognizerFactory for ScriptedRecognizerFactory {
    async fn create(
        &self,
        config: RecognizerConfig,
        sink: RecognitionSink,
    ) -> Result<Arc<dyn SpeechRecognizer>, RecognitionError> {
        self.creations.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| RecognitionError::unsupported("gate closed"))?
                .forget();
        }

        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }

        *self.platform.sink.lock() = Some(sink);
        *self.platform.config.lock() = Some(config);

        Ok(Arc::new(ScriptedRecognizer {
            platform: self.platform.clone(),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

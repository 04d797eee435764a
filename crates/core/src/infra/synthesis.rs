use parking_lot::Mutex;

use crate::domain::speech::{SpeechSynthesizer, SynthesisError};

/// RecordingSynthesizer: 発話せずにテキストを記録するだけのモック実装。
#[derive(Default)]
pub struct RecordingSynthesizer {
    spoken: Mutex<Vec<String>>,
    cancels: Mutex<usize>,
    fail: bool,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// speak が常に失敗する合成器
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn cancels(&self) -> usize {
        *self.cancels.lock()
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        self.spoken.lock().push(text.to_string());
        if self.fail {
            return Err(SynthesisError::Unavailable("audio output disabled".to_string()));
        }
        Ok(())
    }

    fn cancel(&self) {
        *self.cancels.lock() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_spoken_text() {
        let synth = RecordingSynthesizer::new();
        synth.speak("Lights off.").unwrap();
        synth.cancel();
        assert_eq!(synth.spoken(), vec!["Lights off."]);
        assert_eq!(synth.cancels(), 1);
    }

    #[test]
    fn test_failing_still_records() {
        let synth = RecordingSynthesizer::failing();
        assert!(synth.speak("hi").is_err());
        assert_eq!(synth.spoken(), vec!["hi"]);
    }
}

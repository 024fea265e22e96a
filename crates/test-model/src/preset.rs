use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The preset reply for an assistant turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Fragments of the reply, in delivery order.
    pub fragments: Vec<String>,
    /// If set, the stream breaks with an error after delivering this many
    /// fragments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_after: Option<usize>,
    /// Delay before each fragment, in milliseconds. Falls back to the
    /// provider-wide delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified fragments.
    #[inline]
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Makes the stream fail after `count` fragments were delivered.
    #[inline]
    pub fn with_failure_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Sets a per-fragment delay for this response only.
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(delay.as_millis() as u64);
        self
    }

    #[inline]
    pub(crate) fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_script_entry() {
        let json = r#"{ "fragments": ["Hel", "lo"], "fail_after": 1 }"#;
        let preset: PresetResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            preset,
            PresetResponse::with_fragments(["Hel", "lo"]).with_failure_after(1)
        );
        assert_eq!(preset.delay(), None);

        let serialized = serde_json::to_string(
            &PresetResponse::with_fragments(["Hi"])
                .with_delay(Duration::from_millis(5)),
        )
        .unwrap();
        assert_eq!(serialized, r#"{"fragments":["Hi"],"delay_ms":5}"#);
    }
}

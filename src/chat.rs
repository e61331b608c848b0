//! Chat retrieval.
//!
//! Picks the window of messages a member may see and decrypts it. The
//! window is the last `count` messages of the pool by arrival order, minus
//! anything sent at or before the member's `show_since` cutoff, sorted
//! newest-first by sent time.

use chrono::{DateTime, Utc};

use crate::crypto::SymmetricCipher;
use crate::error::PoolError;
use crate::model::{DecryptedMessage, Message};

/// Select the visible window of `messages`.
pub fn select_window(
    messages: &[Message],
    count: usize,
    show_since: Option<DateTime<Utc>>,
) -> Vec<&Message> {
    let skip = messages.len().saturating_sub(count);
    let mut window: Vec<&Message> = messages[skip..]
        .iter()
        .filter(|m| show_since.map_or(true, |since| m.sent > since))
        .collect();
    // Stable: messages with equal timestamps keep their arrival order.
    window.sort_by(|a, b| b.sent.cmp(&a.sent));
    window
}

/// Decrypt every message of `window`. A single failure fails the batch.
pub fn decrypt_window(
    window: &[&Message],
    cipher: &SymmetricCipher,
) -> Result<Vec<DecryptedMessage>, PoolError> {
    window
        .iter()
        .map(|m| {
            Ok(DecryptedMessage {
                sender: m.sender.clone(),
                sent: m.sent,
                text: cipher.decrypt_to_string(&m.text)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn messages(n: i64) -> Vec<Message> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        (0..n)
            .map(|i| Message {
                sender: "alice".into(),
                sent: start + Duration::minutes(i),
                text: vec![i as u8],
            })
            .collect()
    }

    #[test]
    fn test_window_takes_latest_newest_first() {
        let all = messages(10);
        let window = select_window(&all, 3, None);
        let order: Vec<u8> = window.iter().map(|m| m.text[0]).collect();
        assert_eq!(order, vec![9, 8, 7]);
    }

    #[test]
    fn test_count_larger_than_history() {
        let all = messages(2);
        assert_eq!(select_window(&all, 50, None).len(), 2);
        assert!(select_window(&all, 0, None).is_empty());
    }

    #[test]
    fn test_show_since_filters_inside_window() {
        let all = messages(10);
        // Cutoff at message 8: only message 9 is strictly after it.
        let window = select_window(&all, 3, Some(all[8].sent));
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].text[0], 9);

        // Cutoff after everything: nothing in the window survives.
        assert!(select_window(&all, 3, Some(all[9].sent)).is_empty());
    }

    #[test]
    fn test_window_is_taken_before_filtering() {
        let all = messages(10);
        // Cutoff at message 2 leaves 7 visible messages, but only the last
        // three by arrival are ever considered.
        let window = select_window(&all, 3, Some(all[2].sent));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_decrypt_window_all_or_nothing() {
        let cipher = SymmetricCipher::generate(256).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let good = Message {
            sender: "a".into(),
            sent: start,
            text: cipher.encrypt(b"hello").unwrap(),
        };
        let mut bad = good.clone();
        bad.text[20] ^= 0x01;

        let decrypted = decrypt_window(&[&good], &cipher).unwrap();
        assert_eq!(decrypted[0].text, "hello");
        assert_eq!(
            decrypt_window(&[&good, &bad], &cipher),
            Err(PoolError::DecryptionFailure)
        );
    }
}

//! Chunked fan-out of batch messages.
//!
//! A batch body is split into lines and each line is emitted as its own
//! message. Lines are emitted concurrently within a chunk; chunks run strictly
//! one after another, so at most `chunk_size` emits are outstanding at once.

use futures::future::join_all;
use relay_core::{RelayError, RelayResult};
use std::future::Future;

/// Split a batch body into lines.
///
/// Accepts `\n` and `\r\n` separators. Empty lines, including a trailing one,
/// are kept and emitted like any other line.
pub fn split_batch_lines(source_text: &str) -> Vec<&str> {
    source_text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Emit every line of `source_text`, `chunk_size` lines at a time.
///
/// Every emit in a chunk settles before the next chunk starts. If any emit in
/// a chunk fails, the remaining chunks are never started and the batch fails
/// with [`RelayError::PartialBatchFailure`] carrying the number of lines that
/// were emitted (including successes in the failing chunk) and the first
/// failure of that chunk.
///
/// Returns the number of lines emitted.
pub async fn relay_batch<F, Fut>(source_text: &str, chunk_size: usize, emit: F) -> RelayResult<usize>
where
    F: Fn(&str) -> Fut,
    Fut: Future<Output = RelayResult<()>>,
{
    if chunk_size == 0 {
        return Err(RelayError::Config(
            "batch chunk size must be greater than zero".to_string(),
        ));
    }

    let lines = split_batch_lines(source_text);
    let total = lines.len();
    let mut emitted = 0;

    for (chunk_index, chunk) in lines.chunks(chunk_size).enumerate() {
        let results = join_all(chunk.iter().map(|&line| emit(line))).await;
        emitted += results.iter().filter(|r| r.is_ok()).count();

        if let Some(error) = results.into_iter().find_map(Result::err) {
            tracing::warn!(
                chunk = chunk_index,
                emitted = emitted,
                total = total,
                error = %error,
                "Batch chunk failed; remaining chunks not dispatched"
            );
            return Err(RelayError::PartialBatchFailure {
                emitted,
                total,
                source: Box::new(error),
            });
        }

        tracing::debug!(
            chunk = chunk_index,
            chunk_len = chunk.len(),
            emitted = emitted,
            total = total,
            "Batch chunk emitted"
        );
    }

    Ok(emitted)
}

//! Minimal server-sent-event parsing for upstream provider streams.

/// Incremental SSE decoder.
///
/// Feed raw byte chunks in; complete `data:` payloads come out. Events are
/// blocks separated by a blank line; only `data` fields are of interest
/// here (both Gemini and Groq put the whole JSON payload in one data line).
#[derive(Default)]
pub(crate) struct SseBuffer {
    buf: String,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain any events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(end) = self.buf.find("\n\n") {
            let event: String = self.buf.drain(..end + 2).collect();
            for line in event.lines() {
                if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                    payloads.push(data.trim_start().to_string());
                }
            }
        }
        payloads
    }
}

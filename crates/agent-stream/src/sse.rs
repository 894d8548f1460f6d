/// One SSE frame: the `data:` lines seen before a blank line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the server sent one.
    pub event: Option<String>,
    /// Each `data:` line, prefix and one leading space removed.
    pub data_lines: Vec<String>,
}

impl SseFrame {
    /// Data lines joined with `\n`, as the SSE convention defines.
    pub fn data(&self) -> String {
        self.data_lines.join("\n")
    }

    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data_lines.is_empty()
    }
}

/// Incremental SSE decoder.
///
/// Bytes are buffered until a full line is available, so a chunk may end
/// anywhere (including inside a multi-byte UTF-8 character).
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    // `buf[..scanned]` is known to hold no newline.
    scanned: usize,
    current: SseFrame,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every frame completed by it.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut line_start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buf[search_from..].iter().position(|b| *b == b'\n') {
            let line_end = search_from + offset;
            let line = String::from_utf8_lossy(&self.buf[line_start..line_end]).into_owned();
            if let Some(frame) = self.push_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
            line_start = line_end + 1;
            search_from = line_start;
        }
        self.buf.drain(..line_start);
        self.scanned = self.buf.len();
        frames
    }

    /// Flushes a trailing partial line and any unterminated frame.
    ///
    /// Call once the underlying body is exhausted.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            self.scanned = 0;
            let line = String::from_utf8_lossy(&rest);
            if let Some(frame) = self.push_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    /// Bytes held for an incomplete line.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let value = rest.strip_prefix(' ').unwrap_or(rest);
            self.current.data_lines.push(value.to_string());
        } else if let Some(rest) = line.strip_prefix("event:") {
            self.current.event = Some(rest.trim().to_string());
        }
        // id:, retry: and anything else carry nothing for this protocol.
        None
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.current.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_partial_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let part1 = b"data: {\"type\":\"text-delta\",\"delta\":\"hel";
        let part2 = b"lo\"}\n\n";
        assert!(decoder.push_chunk(part1).is_empty());
        assert!(decoder.buffered_len() > 0);
        let frames = decoder.push_chunk(part2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data(), "{\"type\":\"text-delta\",\"delta\":\"hello\"}");
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn crlf_and_comments_and_event_lines() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push_chunk(b": keepalive\r\nevent: message\r\nid: 4\r\ndata: {}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("message"));
        assert_eq!(frames[0].data_lines, vec!["{}".to_string()]);
    }

    #[test]
    fn blank_lines_between_frames_are_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push_chunk(b"\n\ndata: a\n\n\n\ndata: b\n\n");
        let data: Vec<String> = frames.iter().map(SseFrame::data).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: héllo\n\n".as_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).expect("lead byte") + 1;
        assert!(decoder.push_chunk(&bytes[..split]).is_empty());
        let frames = decoder.push_chunk(&bytes[split..]);
        assert_eq!(frames[0].data(), "héllo");
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push_chunk(b"data: tail").is_empty());
        let frame = decoder.finish().expect("trailing frame");
        assert_eq!(frame.data(), "tail");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn large_frame_fed_byte_by_byte() {
        let payload = format!("{{\"type\":\"text-delta\",\"delta\":\"{}\"}}", "x".repeat(64 * 1024));
        let body = format!("data: {payload}\n\ndata: [DONE]\n\n");
        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for byte in body.as_bytes() {
            frames.extend(decoder.push_chunk(std::slice::from_ref(byte)));
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data(), payload);
        assert_eq!(frames[1].data(), "[DONE]");
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn consecutive_data_lines_share_a_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push_chunk(b"data: one\ndata: two\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data(), "one\ntwo");
    }
}

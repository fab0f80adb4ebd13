//! Streaming MIDI decoder
//!
//! Rebuilds whole [`MidiMessage`]s from a TCP byte stream that may be cut at
//! any byte boundary. Handles running status, SysEx framing and garbage
//! resynchronisation. One decoder is owned per console connection so running
//! status never leaks from one stream into another.
//!
//! Never blocks: each `feed` consumes only what the buffer supports and keeps
//! the remainder for the next call.

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use super::{MidiMessage, SYSEX_END, SYSEX_START};

/// Default upper bound for a single SysEx frame, terminator included
pub const DEFAULT_MAX_SYSEX_LEN: usize = 4096;

/// Smallest SysEx limit accepted by [`MidiStreamDecoder::set_max_sysex_len`]
pub const MIN_SYSEX_LEN: usize = 16;

/// A channel-voice status byte (0x80-0xEF), the only kind that can be
/// carried as running status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte(u8);

impl StatusByte {
    /// Wrap a byte if it is a channel status byte
    pub fn new(byte: u8) -> Option<Self> {
        (0x80..=0xEF).contains(&byte).then_some(Self(byte))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Total message length in bytes, status included
    pub fn message_len(self) -> usize {
        match self.0 & 0xF0 {
            0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => 3,
            0xC0 | 0xD0 => 2,
            _ => 1,
        }
    }
}

/// Counters describing what the decoder has seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Complete messages emitted
    pub messages: u64,
    /// Bytes discarded while resynchronising
    pub dropped_bytes: u64,
    /// SysEx frames thrown away for exceeding the length limit
    pub oversize_sysex: u64,
}

enum Step {
    Emit(MidiMessage),
    Skip,
    NeedMore,
}

/// Incremental MIDI stream decoder
#[derive(Debug)]
pub struct MidiStreamDecoder {
    buffer: BytesMut,
    running_status: Option<StatusByte>,
    /// Set after an oversize SysEx was dropped; input is discarded up to the next 0xF7
    discarding_sysex: bool,
    max_sysex_len: usize,
    stats: DecoderStats,
}

impl MidiStreamDecoder {
    /// Create a decoder with the default SysEx limit
    pub fn new() -> Self {
        Self::with_max_sysex_len(DEFAULT_MAX_SYSEX_LEN)
    }

    /// Create a decoder with a custom SysEx limit
    pub fn with_max_sysex_len(max_sysex_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            running_status: None,
            discarding_sysex: false,
            max_sysex_len: max_sysex_len.max(MIN_SYSEX_LEN),
            stats: DecoderStats::default(),
        }
    }

    /// Change the SysEx limit; applies to frames still being collected
    pub fn set_max_sysex_len(&mut self, max_sysex_len: usize) {
        self.max_sysex_len = max_sysex_len.max(MIN_SYSEX_LEN);
    }

    pub fn max_sysex_len(&self) -> usize {
        self.max_sysex_len
    }

    /// Append a chunk and return every message it completes, in stream order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<MidiMessage> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        loop {
            match self.step() {
                Step::Emit(message) => {
                    self.stats.messages += 1;
                    messages.push(message);
                }
                Step::Skip => continue,
                Step::NeedMore => break,
            }
        }
        messages
    }

    /// Forget buffered bytes and running status (connection lost)
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.running_status = None;
        self.discarding_sysex = false;
    }

    pub fn running_status(&self) -> Option<StatusByte> {
        self.running_status
    }

    /// Number of bytes waiting for more data
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    fn drop_bytes(&mut self, count: usize) {
        self.buffer.advance(count);
        self.stats.dropped_bytes += count as u64;
    }

    fn remove_byte(&mut self, index: usize) {
        let mut tail = self.buffer.split_off(index);
        tail.advance(1);
        self.buffer.unsplit(tail);
    }

    fn step(&mut self) -> Step {
        if self.discarding_sysex {
            return self.step_discard_sysex();
        }

        let Some(&first) = self.buffer.first() else {
            return Step::NeedMore;
        };

        match first {
            SYSEX_START => self.step_sysex(),
            SYSEX_END => {
                trace!("Stray SysEx terminator dropped");
                self.drop_bytes(1);
                Step::Skip
            }
            0xF1..=0xF6 => {
                // System common: no data collected, cancels running status
                self.buffer.advance(1);
                self.running_status = None;
                Step::Skip
            }
            0xF8..=0xFF => {
                // Real-time: single byte, running status untouched
                self.buffer.advance(1);
                Step::Skip
            }
            0x80..=0xEF => {
                let status = StatusByte(first);
                self.running_status = Some(status);
                self.step_channel(status, 1)
            }
            _ => match self.running_status {
                Some(status) => self.step_channel(status, 0),
                None => {
                    trace!(byte = first, "Data byte without running status dropped");
                    self.drop_bytes(1);
                    Step::Skip
                }
            },
        }
    }

    /// Collect a channel message whose data starts at `data_start`
    /// (1 when the status byte is in the buffer, 0 under running status)
    fn step_channel(&mut self, status: StatusByte, data_start: usize) -> Step {
        let data_len = status.message_len() - 1;

        // Real-time bytes may sit between data bytes without interrupting them
        while let Some(offset) = self
            .buffer
            .iter()
            .skip(data_start)
            .take(data_len)
            .position(|&b| b >= 0xF8)
        {
            self.remove_byte(data_start + offset);
        }

        let available = self.buffer.len().saturating_sub(data_start).min(data_len);

        // A status byte inside the data region interrupts the message
        if let Some(offset) = self.buffer[data_start..data_start + available]
            .iter()
            .position(|&b| b >= 0x80)
        {
            trace!(
                status = status.get(),
                "Incomplete message interrupted by status byte"
            );
            self.drop_bytes(data_start + offset);
            return Step::Skip;
        }

        if available < data_len {
            return Step::NeedMore;
        }

        self.buffer.advance(data_start);
        let data = self.buffer.split_to(data_len);

        let mut frame = Vec::with_capacity(data_len + 1);
        frame.push(status.get());
        frame.extend_from_slice(&data);

        match MidiMessage::parse(&frame) {
            Some(message) => Step::Emit(message),
            None => {
                self.stats.dropped_bytes += frame.len() as u64;
                Step::Skip
            }
        }
    }

    fn step_sysex(&mut self) -> Step {
        // SysEx cancels running status
        self.running_status = None;

        match self.buffer.iter().position(|&b| b == SYSEX_END) {
            Some(end) if end < self.max_sysex_len => {
                let frame = self.buffer.split_to(end + 1);
                Step::Emit(MidiMessage::SysEx { data: frame.to_vec() })
            }
            Some(end) => {
                warn!(
                    len = end + 1,
                    limit = self.max_sysex_len,
                    "SysEx frame exceeds limit, dropped"
                );
                self.stats.oversize_sysex += 1;
                self.drop_bytes(end + 1);
                Step::Skip
            }
            None if self.buffer.len() > self.max_sysex_len => {
                warn!(
                    buffered = self.buffer.len(),
                    limit = self.max_sysex_len,
                    "Unterminated SysEx exceeds limit, discarding until terminator"
                );
                self.stats.oversize_sysex += 1;
                let len = self.buffer.len();
                self.drop_bytes(len);
                self.discarding_sysex = true;
                Step::NeedMore
            }
            None => Step::NeedMore,
        }
    }

    fn step_discard_sysex(&mut self) -> Step {
        match self.buffer.iter().position(|&b| b == SYSEX_END) {
            Some(end) => {
                self.drop_bytes(end + 1);
                self.discarding_sysex = false;
                Step::Skip
            }
            None => {
                let len = self.buffer.len();
                self.drop_bytes(len);
                Step::NeedMore
            }
        }
    }
}

impl Default for MidiStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed_all(decoder: &mut MidiStreamDecoder, chunks: &[&[u8]]) -> Vec<MidiMessage> {
        chunks.iter().flat_map(|chunk| decoder.feed(chunk)).collect()
    }

    fn feed_split(bytes: &[u8], cuts: &[usize]) -> Vec<MidiMessage> {
        let mut decoder = MidiStreamDecoder::new();
        let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
        cuts.sort_unstable();

        let mut messages = Vec::new();
        let mut start = 0;
        for cut in cuts {
            messages.extend(decoder.feed(&bytes[start..cut]));
            start = cut;
        }
        messages.extend(decoder.feed(&bytes[start..]));
        messages
    }

    #[test]
    fn test_running_status_note_on_pair() {
        let stream = [0x90, 0x01, 0x7F, 0x02, 0x00];
        let expected = vec![
            MidiMessage::NoteOn { channel: 0, note: 1, velocity: 127 },
            MidiMessage::NoteOn { channel: 0, note: 2, velocity: 0 },
        ];

        let mut decoder = MidiStreamDecoder::new();
        assert_eq!(decoder.feed(&stream), expected);

        let mut decoder = MidiStreamDecoder::new();
        let byte_by_byte: Vec<&[u8]> = stream.chunks(1).collect();
        assert_eq!(feed_all(&mut decoder, &byte_by_byte), expected);

        let mut decoder = MidiStreamDecoder::new();
        assert_eq!(feed_all(&mut decoder, &[&stream[..2], &stream[2..4], &stream[4..]]), expected);
    }

    #[test]
    fn test_sysex_emitted_only_after_terminator() {
        let sysex = [
            0xF0, 0x00, 0x00, 0x1A, 0x50, 0x10, 0x01, 0x00, 0x00, 0x02, 0x05, 0xF7,
        ];
        let mut decoder = MidiStreamDecoder::new();

        assert!(decoder.feed(&sysex[..3]).is_empty());
        assert!(decoder.feed(&sysex[3..11]).is_empty());
        assert_eq!(decoder.pending_len(), 11);

        let messages = decoder.feed(&sysex[11..]);
        assert_eq!(messages, vec![MidiMessage::SysEx { data: sysex.to_vec() }]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_parsing_resumes_after_sysex() {
        let mut decoder = MidiStreamDecoder::new();
        let messages = decoder.feed(&[0xF0, 0x01, 0xF7, 0xB0, 0x07, 0x50]);

        assert_eq!(
            messages,
            vec![
                MidiMessage::SysEx { data: vec![0xF0, 0x01, 0xF7] },
                MidiMessage::ControlChange { channel: 0, cc: 7, value: 0x50 },
            ]
        );
    }

    #[test]
    fn test_leading_garbage_is_dropped() {
        let mut decoder = MidiStreamDecoder::new();
        let messages = decoder.feed(&[0x12, 0x34, 0xF7, 0xC1, 0x05]);

        assert_eq!(messages, vec![MidiMessage::ProgramChange { channel: 1, program: 5 }]);
        assert_eq!(decoder.stats().dropped_bytes, 3);
        assert_eq!(decoder.stats().messages, 1);
    }

    #[test]
    fn test_truncated_message_waits() {
        let mut decoder = MidiStreamDecoder::new();
        assert!(decoder.feed(&[0xB0, 0x63]).is_empty());
        assert_eq!(decoder.pending_len(), 2);

        let messages = decoder.feed(&[0x05]);
        assert_eq!(messages, vec![MidiMessage::ControlChange { channel: 0, cc: 0x63, value: 5 }]);
    }

    #[test]
    fn test_running_status_across_nrpn_triple() {
        let mut decoder = MidiStreamDecoder::new();
        let messages = decoder.feed(&[0xB1, 0x63, 0x05, 0x62, 0x17, 0x06, 0x5A]);

        assert_eq!(
            messages,
            vec![
                MidiMessage::ControlChange { channel: 1, cc: 0x63, value: 0x05 },
                MidiMessage::ControlChange { channel: 1, cc: 0x62, value: 0x17 },
                MidiMessage::ControlChange { channel: 1, cc: 0x06, value: 0x5A },
            ]
        );
    }

    #[test]
    fn test_realtime_byte_keeps_running_status() {
        let mut decoder = MidiStreamDecoder::new();
        let messages = decoder.feed(&[0x90, 0x01, 0x7F, 0xF8, 0x02, 0x40]);

        assert_eq!(messages.len(), 2);
        assert_eq!(decoder.running_status(), StatusByte::new(0x90));
    }

    #[test]
    fn test_realtime_byte_inside_message_is_skipped() {
        let expected = vec![
            MidiMessage::NoteOn { channel: 0, note: 1, velocity: 0x7F },
            MidiMessage::NoteOn { channel: 0, note: 2, velocity: 0x40 },
        ];

        let mut decoder = MidiStreamDecoder::new();
        assert_eq!(decoder.feed(&[0x90, 0x01, 0xF8, 0x7F, 0x02, 0x40]), expected);
        assert_eq!(decoder.stats().dropped_bytes, 0);

        // Clock bytes arriving while the message is still incomplete
        let mut decoder = MidiStreamDecoder::new();
        let messages = feed_all(&mut decoder, &[&[0x90, 0x01, 0xF8], &[0xFE, 0x7F, 0x02], &[0xF8, 0x40]]);
        assert_eq!(messages, expected);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_system_common_clears_running_status() {
        let mut decoder = MidiStreamDecoder::new();
        let messages = decoder.feed(&[0x90, 0x01, 0x7F, 0xF6, 0x02, 0x40]);

        assert_eq!(messages.len(), 1);
        assert_eq!(decoder.running_status(), None);
        assert_eq!(decoder.stats().dropped_bytes, 2);
    }

    #[test]
    fn test_status_byte_interrupts_partial_message() {
        let mut decoder = MidiStreamDecoder::new();
        let messages = decoder.feed(&[0x90, 0x01, 0xB0, 0x07, 0x50]);

        assert_eq!(messages, vec![MidiMessage::ControlChange { channel: 0, cc: 7, value: 0x50 }]);
        assert_eq!(decoder.stats().dropped_bytes, 2);
    }

    #[test]
    fn test_unterminated_sysex_is_bounded() {
        let mut decoder = MidiStreamDecoder::with_max_sysex_len(16);

        let mut flood = vec![0xF0];
        flood.extend(std::iter::repeat(0x11).take(40));
        assert!(decoder.feed(&flood).is_empty());
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.stats().oversize_sysex, 1);

        // The tail of the oversize frame is skipped, then parsing resumes
        assert!(decoder.feed(&[0x22, 0x33]).is_empty());
        let messages = decoder.feed(&[0x44, 0xF7, 0xB0, 0x07, 0x10]);
        assert_eq!(messages, vec![MidiMessage::ControlChange { channel: 0, cc: 7, value: 0x10 }]);
    }

    #[test]
    fn test_terminated_sysex_over_limit_is_dropped() {
        let mut decoder = MidiStreamDecoder::with_max_sysex_len(16);
        let mut frame = vec![0xF0];
        frame.extend(std::iter::repeat(0x01).take(20));
        frame.push(0xF7);
        frame.extend_from_slice(&[0xC0, 0x03]);

        let messages = decoder.feed(&frame);
        assert_eq!(messages, vec![MidiMessage::ProgramChange { channel: 0, program: 3 }]);
        assert_eq!(decoder.stats().oversize_sysex, 1);
    }

    #[test]
    fn test_reset_forgets_running_status() {
        let mut decoder = MidiStreamDecoder::new();
        decoder.feed(&[0x90, 0x01, 0x7F, 0x02]);
        decoder.reset();

        assert_eq!(decoder.running_status(), None);
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.feed(&[0x03, 0x04]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_output(
            bytes in prop::collection::vec(any::<u8>(), 0..128),
            cuts in prop::collection::vec(any::<usize>(), 0..8),
        ) {
            let mut whole = MidiStreamDecoder::new();
            let expected = whole.feed(&bytes);

            prop_assert_eq!(feed_split(&bytes, &cuts), expected);
        }

        #[test]
        fn prop_valid_messages_round_trip(
            messages in prop::collection::vec(
                (0u8..16, 0u8..128, 0u8..128).prop_map(|(channel, cc, value)| {
                    MidiMessage::ControlChange { channel, cc, value }
                }),
                1..20,
            ),
        ) {
            let bytes: Vec<u8> = messages.iter().flat_map(|m| m.encode()).collect();
            let mut decoder = MidiStreamDecoder::new();

            prop_assert_eq!(decoder.feed(&bytes), messages);
        }
    }
}

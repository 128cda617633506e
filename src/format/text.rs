//! Text batch reader and writer.
//!
//! The reader is a single left-to-right cursor scan. Each record is yielded
//! as soon as its trailer has been seen, and the first malformed record ends
//! the batch with a [`FormatError`].

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::error::FormatError;
use crate::message::{Message, MessageType};

// ============================================================================
// Constants
// ============================================================================

/// First byte of every text batch.
const BATCH_PREFIX: u8 = b'T';

/// Separates the length, type and payload fields.
const FIELD_DELIMITER: u8 = b':';

/// Terminates every record.
const RECORD_TRAILER: u8 = b';';

// ============================================================================
// Reading
// ============================================================================

/// Returns a lazy reader over the records of `data`.
///
/// Prefix validation happens on the first call to `next`.
#[inline]
#[must_use]
pub fn read_messages(data: &[u8]) -> TextBatchReader<'_> {
    TextBatchReader::new(data)
}

/// Decodes a whole batch.
///
/// # Errors
///
/// Returns the first [`FormatError`] encountered.
pub fn decode_all(data: &[u8]) -> Result<Vec<Message>, FormatError> {
    read_messages(data).collect()
}

/// Iterator over the messages of one text batch.
///
/// Yields `Err` at most once, after which it is exhausted. Messages yielded
/// before the error remain valid.
#[derive(Debug, Clone)]
pub struct TextBatchReader<'a> {
    data: &'a [u8],
    cursor: usize,
    state: ReaderState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Prefix,
    Records,
    Done,
}

impl<'a> TextBatchReader<'a> {
    /// Creates a reader over `data`.
    #[inline]
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            cursor: 0,
            state: ReaderState::Prefix,
        }
    }

    /// Parses the record at the cursor.
    fn read_record(&mut self) -> Result<Message, FormatError> {
        let length = self.read_length()?;
        self.cursor += 1;

        let message_type = self.read_type()?;
        self.cursor += 1;

        let payload = self.read_payload(length, message_type)?;
        self.cursor += 1;

        Ok(Message::new(payload, message_type, true))
    }

    /// Reads the decimal length field, leaving the cursor on its `:`.
    fn read_length(&mut self) -> Result<usize, FormatError> {
        let start = self.cursor;
        self.cursor = self.index_of(FIELD_DELIMITER, start);
        if self.cursor >= self.data.len() {
            return Err(FormatError::UnterminatedLength);
        }

        self.data[start..self.cursor]
            .iter()
            .try_fold(0usize, |length, &byte| {
                if !byte.is_ascii_digit() {
                    return None;
                }
                length
                    .checked_mul(10)?
                    .checked_add(usize::from(byte - b'0'))
            })
            .ok_or(FormatError::InvalidLength)
    }

    /// Reads the one-byte type field, leaving the cursor on its `:`.
    fn read_type(&mut self) -> Result<MessageType, FormatError> {
        let start = self.cursor;
        self.cursor = self.index_of(FIELD_DELIMITER, start);
        if self.cursor >= self.data.len() {
            return Err(FormatError::UnterminatedType);
        }

        if self.cursor - start != 1 {
            return Err(FormatError::InvalidTypeLength);
        }

        let tag = self.data[start];
        MessageType::from_tag(tag).ok_or(FormatError::UnknownType(char::from(tag)))
    }

    /// Reads `length` payload bytes, leaving the cursor on the trailer.
    fn read_payload(
        &mut self,
        length: usize,
        message_type: MessageType,
    ) -> Result<Bytes, FormatError> {
        let start = self.cursor;
        let end = start
            .checked_add(length)
            .filter(|&end| end < self.data.len())
            .ok_or(FormatError::UnterminatedPayload)?;

        if self.data[end] != RECORD_TRAILER {
            return Err(FormatError::MissingTrailer);
        }
        self.cursor = end;

        let raw = &self.data[start..end];
        match message_type {
            MessageType::Binary => STANDARD
                .decode(raw)
                .map(Bytes::from)
                .map_err(|e| FormatError::InvalidBase64(e.to_string())),
            _ => Ok(Bytes::copy_from_slice(raw)),
        }
    }

    /// Position of the next `byte` at or after `start`, or the data length.
    fn index_of(&self, byte: u8, start: usize) -> usize {
        self.data[start..]
            .iter()
            .position(|&b| b == byte)
            .map_or(self.data.len(), |offset| start + offset)
    }
}

impl Iterator for TextBatchReader<'_> {
    type Item = Result<Message, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReaderState::Prefix {
            if self.data.first() != Some(&BATCH_PREFIX) {
                self.state = ReaderState::Done;
                return Some(Err(FormatError::MissingPrefix));
            }
            self.cursor = 1;
            self.state = ReaderState::Records;
        }

        if self.state == ReaderState::Done || self.cursor >= self.data.len() {
            self.state = ReaderState::Done;
            return None;
        }

        let record = self.read_record();
        if record.is_err() {
            self.state = ReaderState::Done;
        }
        Some(record)
    }
}

impl std::iter::FusedIterator for TextBatchReader<'_> {}

// ============================================================================
// Writing
// ============================================================================

/// Appends a text batch holding `messages` to `out`.
///
/// Binary payloads are Base64 encoded and their length field counts the
/// encoded characters.
pub fn write_messages<'a, I>(messages: I, out: &mut Vec<u8>)
where
    I: IntoIterator<Item = &'a Message>,
{
    out.push(BATCH_PREFIX);
    for message in messages {
        write_record(message, out);
    }
}

/// Encodes `messages` into a new text batch.
#[must_use]
pub fn encode<'a, I>(messages: I) -> Bytes
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut out = Vec::new();
    write_messages(messages, &mut out);
    Bytes::from(out)
}

fn write_record(message: &Message, out: &mut Vec<u8>) {
    let encoded;
    let payload: &[u8] = match message.message_type() {
        MessageType::Binary => {
            encoded = STANDARD.encode(message.payload());
            encoded.as_bytes()
        }
        _ => &message.payload()[..],
    };

    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(FIELD_DELIMITER);
    out.push(message.message_type().as_tag());
    out.push(FIELD_DELIMITER);
    out.extend_from_slice(payload);
    out.push(RECORD_TRAILER);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn decode_one(data: &str) -> Message {
        let messages = decode_all(data.as_bytes()).expect("batch should decode");
        assert_eq!(messages.len(), 1);
        messages.into_iter().next().expect("one message")
    }

    fn decode_err(data: &str) -> FormatError {
        decode_all(data.as_bytes()).expect_err("batch should be rejected")
    }

    fn assert_message(message: &Message, message_type: MessageType, payload: &[u8]) {
        assert!(message.end_of_message());
        assert_eq!(message.message_type(), message_type);
        assert_eq!(message.payload().as_ref(), payload);
    }

    #[test]
    fn test_read_single_text_messages() {
        let cases: &[(&str, MessageType, &str)] = &[
            ("T0:T:;", MessageType::Text, ""),
            ("T3:T:ABC;", MessageType::Text, "ABC"),
            ("T11:T:A\nR\rC\r\n;DEF;", MessageType::Text, "A\nR\rC\r\n;DEF"),
            ("T0:C:;", MessageType::Close, ""),
            ("T17:C:Connection Closed;", MessageType::Close, "Connection Closed"),
            ("T0:E:;", MessageType::Error, ""),
            ("T12:E:Server Error;", MessageType::Error, "Server Error"),
        ];

        for (data, message_type, payload) in cases {
            assert_message(&decode_one(data), *message_type, payload.as_bytes());
        }
    }

    #[test]
    fn test_read_single_binary_messages() {
        assert_message(&decode_one("T0:B:;"), MessageType::Binary, &[]);
        assert_message(
            &decode_one("T8:B:q83vEg==;"),
            MessageType::Binary,
            &[0xAB, 0xCD, 0xEF, 0x12],
        );
    }

    #[test]
    fn test_read_multiple_messages() {
        let data = "T0:B:;14:T:Hello,\r\nWorld!;1:C:A;12:E:Server Error;";
        let messages = decode_all(data.as_bytes()).expect("batch should decode");

        assert_eq!(messages.len(), 4);
        assert_message(&messages[0], MessageType::Binary, b"");
        assert_message(&messages[1], MessageType::Text, b"Hello,\r\nWorld!");
        assert_message(&messages[2], MessageType::Close, b"A");
        assert_message(&messages[3], MessageType::Error, b"Server Error");
    }

    #[test]
    fn test_prefix_only_is_empty_batch() {
        assert!(decode_all(b"T").expect("empty batch").is_empty());
    }

    #[test]
    fn test_invalid_messages() {
        let cases: &[(&str, FormatError)] = &[
            ("", FormatError::MissingPrefix),
            ("ABC", FormatError::MissingPrefix),
            ("T1230450945", FormatError::UnterminatedLength),
            ("T12ab34:", FormatError::InvalidLength),
            ("T1:asdf", FormatError::UnterminatedType),
            ("T1::", FormatError::InvalidTypeLength),
            ("T1:AB:", FormatError::InvalidTypeLength),
            ("T1:X:A;", FormatError::UnknownType('X')),
            ("T5:T:A", FormatError::UnterminatedPayload),
            ("T5:T:ABCDE", FormatError::UnterminatedPayload),
            ("T5:T:ABCDEF", FormatError::MissingTrailer),
        ];

        for (data, expected) in cases {
            assert_eq!(&decode_err(data), expected, "input {data:?}");
        }
    }

    #[test]
    fn test_overflowing_length_is_invalid() {
        assert_eq!(
            decode_err("T99999999999999999999999999:T:A;"),
            FormatError::InvalidLength
        );
    }

    #[test]
    fn test_invalid_base64_is_length_error() {
        let err = decode_err("T4:B:!!!!;");
        assert!(matches!(err, FormatError::InvalidBase64(_)));
        assert!(err.is_length_error());
    }

    #[test]
    fn test_reader_yields_valid_prefix_before_error() {
        let mut reader = read_messages(b"T3:T:ABC;5:T:AB");

        let first = reader.next().expect("first item").expect("first record");
        assert_message(&first, MessageType::Text, b"ABC");

        assert_eq!(
            reader.next(),
            Some(Err(FormatError::UnterminatedPayload))
        );
        assert_eq!(reader.next(), None);
        assert_eq!(reader.next(), None);
    }

    #[test]
    fn test_binary_length_counts_encoded_bytes() {
        let wire = encode(&[Message::binary(vec![0xAB, 0xCD, 0xEF, 0x12])]);
        assert_eq!(wire.as_ref(), b"T8:B:q83vEg==;");
    }

    #[test]
    fn test_write_multiple_messages() {
        let messages = [
            Message::binary(Vec::new()),
            Message::text("Hello,\r\nWorld!"),
            Message::close("A"),
            Message::error("Server Error"),
        ];
        let wire = encode(&messages);
        assert_eq!(
            wire.as_ref(),
            b"T0:B:;14:T:Hello,\r\nWorld!;1:C:A;12:E:Server Error;"
        );
    }

    #[test]
    fn test_write_appends_to_buffer() {
        let mut out = b"xx".to_vec();
        write_messages(&[Message::text("a")], &mut out);
        assert_eq!(out, b"xxT1:T:a;");
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        let message_type = prop_oneof![
            Just(MessageType::Text),
            Just(MessageType::Binary),
            Just(MessageType::Close),
            Just(MessageType::Error),
        ];
        (proptest::collection::vec(any::<u8>(), 0..64), message_type)
            .prop_map(|(payload, message_type)| Message::new(payload, message_type, true))
    }

    proptest! {
        #[test]
        fn prop_encode_then_decode_is_identity(
            messages in proptest::collection::vec(arb_message(), 0..8)
        ) {
            let wire = encode(&messages);
            let decoded = decode_all(&wire).expect("encoded batch should decode");
            prop_assert_eq!(decoded, messages);
        }
    }
}

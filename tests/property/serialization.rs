//! Property-based codec tests.
//!
//! Uses proptest to verify:
//! 1. Any well-formed `ChatMessage` survives encode → decode.
//! 2. Random bytes never cause a panic in `decode` and never yield a
//!    message with an empty required field.
//! 3. `encoded_len` always matches the produced encoding.
//! 4. Messages missing `from` or `data` never encode.

use proptest::prelude::*;
use syncdemo_proto::codec::{self, EncodeError};
use syncdemo_proto::message::{ChatMessage, Field, MessageType, Timestamp};

/// Strategy for generating arbitrary `MessageType` values.
fn arb_message_type() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Chat),
        Just(MessageType::Hello),
        Just(MessageType::Leave),
    ]
}

/// Strategy for generating well-formed `ChatMessage` values.
fn arb_chat_message() -> impl Strategy<Value = ChatMessage> {
    (
        "[a-z][a-z0-9_]{0,15}",
        "[a-z][a-z0-9-]{0,31}",
        "[^\x00]{1,512}",
        any::<u64>(),
        arb_message_type(),
    )
        .prop_map(|(from, to, data, secs, msg_type)| ChatMessage {
            from,
            to,
            data,
            timestamp: Timestamp::from_secs(secs),
            msg_type,
        })
}

proptest! {
    #[test]
    fn chat_message_round_trip(msg in arb_chat_message()) {
        let bytes = codec::encode(&msg).unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        prop_assert_eq!(msg, decoded);
    }

    #[test]
    fn encoded_len_matches_encoding(msg in arb_chat_message()) {
        let bytes = codec::encode(&msg).unwrap();
        prop_assert_eq!(codec::encoded_len(&msg).unwrap(), bytes.len());
    }

    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        if let Ok(msg) = codec::decode(&bytes) {
            prop_assert!(msg.missing_field().is_none());
        }
    }

    #[test]
    fn truncated_encoding_never_decodes(msg in arb_chat_message(), cut in 1usize..64) {
        let bytes = codec::encode(&msg).unwrap();
        let keep = bytes.len().saturating_sub(cut);
        prop_assert!(codec::decode(&bytes[..keep]).is_err());
    }

    #[test]
    fn missing_sender_never_encodes(mut msg in arb_chat_message()) {
        msg.from.clear();
        prop_assert_eq!(
            codec::encode(&msg),
            Err(EncodeError::MissingField(Field::From))
        );
    }

    #[test]
    fn missing_data_never_encodes(mut msg in arb_chat_message()) {
        msg.data.clear();
        prop_assert_eq!(
            codec::encode(&msg),
            Err(EncodeError::MissingField(Field::Data))
        );
    }
}

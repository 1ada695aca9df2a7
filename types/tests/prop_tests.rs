use proptest::prelude::*;

use drawtree_types::{slot_at, slot_start_millis, AccountId, NodeHash, PublicKey, TxId};

proptest! {
    /// NodeHash::is_zero is true only for all-zero bytes.
    #[test]
    fn node_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = NodeHash::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// Display is the full lowercase hex of the bytes.
    #[test]
    fn node_hash_display_is_hex(bytes in prop::array::uniform32(0u8..)) {
        let shown = NodeHash::new(bytes).to_string();
        prop_assert_eq!(shown.len(), 64);
        prop_assert_eq!(shown, hex::encode(bytes));
    }

    /// Every public key survives the identity encoding.
    #[test]
    fn account_identity_embeds_key(bytes in prop::array::uniform32(0u8..)) {
        let key = PublicKey(bytes);
        let id = AccountId::from_public_key(&key);
        prop_assert_eq!(id.to_public_key(), Some(key));
        let parsed: AccountId = id.as_str().parse().unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// Account ordering agrees with string ordering.
    #[test]
    fn account_ordering_matches_strings(
        a in prop::array::uniform32(0u8..),
        b in prop::array::uniform32(0u8..),
    ) {
        let ia = AccountId::from_public_key(&PublicKey(a));
        let ib = AccountId::from_public_key(&PublicKey(b));
        prop_assert_eq!(ia.cmp(&ib), ia.as_str().cmp(ib.as_str()));
    }

    /// Transaction IDs keep their local index.
    #[test]
    fn tx_id_keeps_index(index in 0u64..u64::MAX, port in 1u16..u16::MAX) {
        let id = TxId::new(index, &format!("10.0.0.1:{port}"));
        prop_assert_eq!(id.index(), Some(index));
    }

    /// A slot's start time maps back to the same slot.
    #[test]
    fn slot_start_is_inside_slot(slot in 0u64..1_000_000_000, duration in 1u64..10_000) {
        let start = slot_start_millis(slot, duration);
        prop_assert_eq!(slot_at(start, duration), slot);
        prop_assert_eq!(slot_at(start + duration - 1, duration), slot);
    }
}

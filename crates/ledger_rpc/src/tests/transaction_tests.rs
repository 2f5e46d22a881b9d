use shared::domain::{Address, Blockhash, Lamports, Signature};

use crate::transaction::{encode_length, system_transfer, Message, Transaction, TransactionError};

fn payer() -> Address {
    Address::new([1u8; 32])
}

fn recipient() -> Address {
    Address::new([2u8; 32])
}

fn blockhash() -> Blockhash {
    Blockhash::new([9u8; 32])
}

#[test]
fn compact_length_prefix_matches_wire_layout() {
    let cases: [(usize, &[u8]); 5] = [
        (0, &[0x00]),
        (127, &[0x7f]),
        (128, &[0x80, 0x01]),
        (16_383, &[0xff, 0x7f]),
        (16_384, &[0x80, 0x80, 0x01]),
    ];
    for (len, expected) in cases {
        let mut out = Vec::new();
        encode_length(&mut out, len);
        assert_eq!(out, expected, "length {len}");
    }
}

#[test]
fn transfer_instruction_encodes_tag_and_lamports() {
    let instruction = system_transfer(&payer(), &recipient(), Lamports(100_000_000));
    assert_eq!(instruction.program_id, Address::SYSTEM_PROGRAM);
    assert_eq!(&instruction.data[..4], &2u32.to_le_bytes());
    assert_eq!(&instruction.data[4..], &100_000_000u64.to_le_bytes());
    assert!(instruction.accounts[0].is_signer && instruction.accounts[0].is_writable);
    assert!(!instruction.accounts[1].is_signer && instruction.accounts[1].is_writable);
}

#[test]
fn compiles_transfer_message_with_payer_first() {
    let instruction = system_transfer(&payer(), &recipient(), Lamports(5));
    let message = Message::new(&[instruction], &payer(), blockhash()).expect("message");

    assert_eq!(message.header.num_required_signatures, 1);
    assert_eq!(message.header.num_readonly_signed_accounts, 0);
    assert_eq!(message.header.num_readonly_unsigned_accounts, 1);
    assert_eq!(
        message.account_keys,
        vec![payer(), recipient(), Address::SYSTEM_PROGRAM]
    );
    assert_eq!(message.fee_payer(), Some(&payer()));
    assert_eq!(message.instructions[0].program_id_index, 2);
    assert_eq!(message.instructions[0].accounts, vec![0, 1]);

    let bytes = message.serialize();
    // header + keys + blockhash + one instruction with 2 accounts and 12 data bytes
    assert_eq!(bytes.len(), 3 + 1 + 3 * 32 + 32 + 1 + 1 + 1 + 2 + 1 + 12);
    assert_eq!(&bytes[..4], &[1, 0, 1, 3]);
    assert_eq!(&bytes[4..36], payer().as_bytes());
    assert_eq!(&bytes[100..132], blockhash().as_bytes());
}

#[test]
fn self_transfer_deduplicates_accounts() {
    let instruction = system_transfer(&payer(), &payer(), Lamports(5));
    let message = Message::new(&[instruction], &payer(), blockhash()).expect("message");
    assert_eq!(message.account_keys, vec![payer(), Address::SYSTEM_PROGRAM]);
    assert_eq!(message.instructions[0].accounts, vec![0, 0]);
}

#[test]
fn transaction_requires_all_signatures_before_serializing() {
    let instruction = system_transfer(&payer(), &recipient(), Lamports(5));
    let message = Message::new(&[instruction], &payer(), blockhash()).expect("message");
    let mut tx = Transaction::new_unsigned(message);

    assert!(!tx.is_fully_signed());
    assert_eq!(tx.id(), None);
    assert_eq!(tx.serialize(), Err(TransactionError::MissingSignatures(1)));
    assert_eq!(
        tx.add_signature(&recipient(), Signature::new([4u8; 64])),
        Err(TransactionError::UnknownSigner(recipient()))
    );

    tx.add_signature(&payer(), Signature::new([4u8; 64]))
        .expect("payer signs");
    assert!(tx.is_fully_signed());
    assert_eq!(tx.id(), Some(Signature::new([4u8; 64])));

    let wire = tx.serialize().expect("wire");
    assert_eq!(wire[0], 1);
    assert_eq!(&wire[1..65], &[4u8; 64]);
    assert_eq!(&wire[65..], tx.message_data().as_slice());
}

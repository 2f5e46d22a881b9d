//! Legacy transaction message compilation and wire encoding.

use shared::domain::{Address, Blockhash, Lamports, Signature};
use thiserror::Error;

const SYSTEM_TRANSFER_TAG: u32 = 2;
const MAX_ACCOUNT_KEYS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction references {0} accounts; at most 256 are allowed")]
    TooManyAccounts(usize),
    #[error("{0} is not a required signer of this transaction")]
    UnknownSigner(Address),
    #[error("transaction is missing {0} signature(s)")]
    MissingSignatures(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// System program instruction moving `lamports` from `from` to `to`.
pub fn system_transfer(from: &Address, to: &Address, lamports: Lamports) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.0.to_le_bytes());
    Instruction {
        program_id: Address::SYSTEM_PROGRAM,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Address>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Debug, Clone, Copy)]
struct KeyUsage {
    address: Address,
    is_signer: bool,
    is_writable: bool,
}

impl Message {
    /// Compiles instructions into a message with `payer` as the first (fee-paying) signer.
    pub fn new(
        instructions: &[Instruction],
        payer: &Address,
        recent_blockhash: Blockhash,
    ) -> Result<Self, TransactionError> {
        let mut usages: Vec<KeyUsage> = vec![KeyUsage {
            address: *payer,
            is_signer: true,
            is_writable: true,
        }];
        let mut record = |address: Address, is_signer: bool, is_writable: bool| {
            match usages.iter_mut().find(|usage| usage.address == address) {
                Some(usage) => {
                    usage.is_signer |= is_signer;
                    usage.is_writable |= is_writable;
                }
                None => usages.push(KeyUsage {
                    address,
                    is_signer,
                    is_writable,
                }),
            }
        };
        for instruction in instructions {
            for meta in &instruction.accounts {
                record(meta.address, meta.is_signer, meta.is_writable);
            }
        }
        for instruction in instructions {
            record(instruction.program_id, false, false);
        }

        if usages.len() > MAX_ACCOUNT_KEYS {
            return Err(TransactionError::TooManyAccounts(usages.len()));
        }

        // signed+writable, signed+readonly, unsigned+writable, unsigned+readonly
        let group = |usage: &KeyUsage| match (usage.is_signer, usage.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        usages.sort_by_key(group);

        let count = |wanted: u8| usages.iter().filter(|usage| group(*usage) == wanted).count();
        let header = MessageHeader {
            num_required_signatures: (count(0) + count(1)) as u8,
            num_readonly_signed_accounts: count(1) as u8,
            num_readonly_unsigned_accounts: count(3) as u8,
        };
        let account_keys: Vec<Address> = usages.iter().map(|usage| usage.address).collect();
        let index_of = |address: &Address| {
            account_keys
                .iter()
                .position(|key| key == address)
                .map(|position| position as u8)
                .unwrap_or_default()
        };
        let instructions = instructions
            .iter()
            .map(|instruction| CompiledInstruction {
                program_id_index: index_of(&instruction.program_id),
                accounts: instruction
                    .accounts
                    .iter()
                    .map(|meta| index_of(&meta.address))
                    .collect(),
                data: instruction.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    pub fn fee_payer(&self) -> Option<&Address> {
        self.account_keys.first()
    }

    pub fn signer_keys(&self) -> &[Address] {
        let signers = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..signers]
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.account_keys.len() * 32);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);
        encode_length(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());
        encode_length(&mut out, self.instructions.len());
        for instruction in &self.instructions {
            out.push(instruction.program_id_index);
            encode_length(&mut out, instruction.accounts.len());
            out.extend_from_slice(&instruction.accounts);
            encode_length(&mut out, instruction.data.len());
            out.extend_from_slice(&instruction.data);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    pub fn new_unsigned(message: Message) -> Self {
        let signatures = vec![Signature::zeroed(); message.signer_keys().len()];
        Self {
            signatures,
            message,
        }
    }

    /// Bytes every required signer signs.
    pub fn message_data(&self) -> Vec<u8> {
        self.message.serialize()
    }

    pub fn add_signature(
        &mut self,
        signer: &Address,
        signature: Signature,
    ) -> Result<(), TransactionError> {
        let position = self
            .message
            .signer_keys()
            .iter()
            .position(|key| key == signer)
            .ok_or(TransactionError::UnknownSigner(*signer))?;
        self.signatures[position] = signature;
        Ok(())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(|signature| !signature.is_zeroed())
    }

    /// Signature identifying the transaction on the ledger (the fee payer's).
    pub fn id(&self) -> Option<Signature> {
        self.signatures
            .first()
            .copied()
            .filter(|signature| !signature.is_zeroed())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        let missing = self
            .signatures
            .iter()
            .filter(|signature| signature.is_zeroed())
            .count();
        if missing > 0 {
            return Err(TransactionError::MissingSignatures(missing));
        }
        let message = self.message.serialize();
        let mut out = Vec::with_capacity(1 + self.signatures.len() * 64 + message.len());
        encode_length(&mut out, self.signatures.len());
        for signature in &self.signatures {
            out.extend_from_slice(signature.as_bytes());
        }
        out.extend_from_slice(&message);
        Ok(out)
    }
}

/// compact-u16 length prefix
pub(crate) fn encode_length(out: &mut Vec<u8>, len: usize) {
    let mut remaining = len as u16;
    loop {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

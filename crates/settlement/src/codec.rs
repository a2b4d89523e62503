//! Binary codec for the settlement program
//!
//! Accounts are described by an [`AccountSchema`]: an ordered list of fixed
//! width fields following the 8-byte account discriminator. One generic
//! reader consumes every schema, so a layout change is a one-line edit to the
//! schema rather than a new set of offsets.
//!
//! Integers are little-endian. 32-byte fields are raw key bytes.

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::{Result, SettlementError};

pub const DISCRIMINATOR_LEN: usize = 8;

const MAX_SEEDS: usize = 16;
const MAX_SEED_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Pubkey,
    Bytes32,
    U8,
    Bool,
    U16,
    U64,
    I64,
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::Pubkey | FieldKind::Bytes32 => 32,
            FieldKind::U8 | FieldKind::Bool => 1,
            FieldKind::U16 => 2,
            FieldKind::U64 | FieldKind::I64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Fixed-layout account description.
///
/// `fields` may describe only a prefix of the real account (e.g. when a
/// variable-length field follows); the remaining bytes are ignored.
#[derive(Debug, Clone, Copy)]
pub struct AccountSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl AccountSchema {
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { name, fields }
    }

    /// Bytes required to decode every field, discriminator included.
    pub const fn min_len(&self) -> usize {
        let mut len = DISCRIMINATOR_LEN;
        let mut i = 0;
        while i < self.fields.len() {
            len += self.fields[i].kind.width();
            i += 1;
        }
        len
    }

    pub fn discriminator(&self) -> [u8; 8] {
        account_discriminator(self.name)
    }

    /// Serialize `values` in schema order behind the discriminator.
    pub fn encode(&self, values: &[FieldValue]) -> Result<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(SettlementError::MalformedAccount {
                account: self.name,
                reason: format!("expected {} fields, got {}", self.fields.len(), values.len()),
            });
        }
        let mut out = Vec::with_capacity(self.min_len());
        out.extend_from_slice(&self.discriminator());
        for (spec, value) in self.fields.iter().zip(values) {
            if value.kind() != spec.kind {
                return Err(SettlementError::MalformedAccount {
                    account: self.name,
                    reason: format!("field {} expects {:?}, got {:?}", spec.name, spec.kind, value.kind()),
                });
            }
            value.write(&mut out);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Pubkey(Pubkey),
    Bytes32([u8; 32]),
    U8(u8),
    Bool(bool),
    U16(u16),
    U64(u64),
    I64(i64),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Pubkey(_) => FieldKind::Pubkey,
            FieldValue::Bytes32(_) => FieldKind::Bytes32,
            FieldValue::U8(_) => FieldKind::U8,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::U16(_) => FieldKind::U16,
            FieldValue::U64(_) => FieldKind::U64,
            FieldValue::I64(_) => FieldKind::I64,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            FieldValue::Pubkey(key) => out.extend_from_slice(key.as_ref()),
            FieldValue::Bytes32(bytes) => out.extend_from_slice(bytes),
            FieldValue::U8(v) => out.push(*v),
            FieldValue::Bool(v) => out.push(u8::from(*v)),
            FieldValue::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    fn read(kind: FieldKind, bytes: &[u8]) -> Option<Self> {
        Some(match kind {
            FieldKind::Pubkey => FieldValue::Pubkey(Pubkey::new_from_array(bytes.try_into().ok()?)),
            FieldKind::Bytes32 => FieldValue::Bytes32(bytes.try_into().ok()?),
            FieldKind::U8 => FieldValue::U8(bytes[0]),
            FieldKind::Bool => match bytes[0] {
                0 => FieldValue::Bool(false),
                1 => FieldValue::Bool(true),
                _ => return None,
            },
            FieldKind::U16 => FieldValue::U16(u16::from_le_bytes(bytes.try_into().ok()?)),
            FieldKind::U64 => FieldValue::U64(u64::from_le_bytes(bytes.try_into().ok()?)),
            FieldKind::I64 => FieldValue::I64(i64::from_le_bytes(bytes.try_into().ok()?)),
        })
    }
}

/// Named field values produced by [`decode_account`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAccount {
    account: &'static str,
    fields: Vec<(&'static str, FieldValue)>,
}

macro_rules! typed_getter {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self, name: &str) -> Result<$ty> {
            match self.get(name)? {
                FieldValue::$variant(v) => Ok(v),
                other => Err(self.wrong_kind(name, other)),
            }
        }
    };
}

impl DecodedAccount {
    pub fn account(&self) -> &'static str {
        self.account
    }

    pub fn get(&self, name: &str) -> Result<FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
            .ok_or_else(|| SettlementError::MalformedAccount {
                account: self.account,
                reason: format!("no field named {}", name),
            })
    }

    typed_getter!(pubkey, Pubkey, Pubkey);
    typed_getter!(bytes32, Bytes32, [u8; 32]);
    typed_getter!(u8, U8, u8);
    typed_getter!(bool, Bool, bool);
    typed_getter!(u16, U16, u16);
    typed_getter!(u64, U64, u64);
    typed_getter!(i64, I64, i64);

    fn wrong_kind(&self, name: &str, value: FieldValue) -> SettlementError {
        SettlementError::MalformedAccount {
            account: self.account,
            reason: format!("field {} is {:?}", name, value.kind()),
        }
    }
}

/// Decode `buffer` against `schema`.
///
/// The length is checked before any field is read. The discriminator must
/// match the schema's account name and bool bytes must be 0 or 1.
pub fn decode_account(buffer: &[u8], schema: &AccountSchema) -> Result<DecodedAccount> {
    let required = schema.min_len();
    if buffer.len() < required {
        return Err(SettlementError::AccountTooShort {
            account: schema.name,
            required,
            actual: buffer.len(),
        });
    }
    if buffer[..DISCRIMINATOR_LEN] != schema.discriminator() {
        return Err(SettlementError::MalformedAccount {
            account: schema.name,
            reason: "discriminator mismatch".to_string(),
        });
    }

    let mut offset = DISCRIMINATOR_LEN;
    let mut fields = Vec::with_capacity(schema.fields.len());
    for spec in schema.fields {
        let width = spec.kind.width();
        let value = FieldValue::read(spec.kind, &buffer[offset..offset + width]).ok_or_else(|| {
            SettlementError::MalformedAccount {
                account: schema.name,
                reason: format!("invalid {:?} value for {} at offset {}", spec.kind, spec.name, offset),
            }
        })?;
        fields.push((spec.name, value));
        offset += width;
    }

    Ok(DecodedAccount {
        account: schema.name,
        fields,
    })
}

/// Deterministic program-derived address for `seeds`.
pub fn derive_address(program_id: &Pubkey, seeds: &[&[u8]]) -> Result<(Pubkey, u8)> {
    if seeds.len() >= MAX_SEEDS {
        return Err(SettlementError::validation(
            "seeds",
            format!("{} seeds exceed the limit of {}", seeds.len(), MAX_SEEDS - 1),
        ));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(SettlementError::validation(
            "seeds",
            format!("seed of {} bytes exceeds {}", seed.len(), MAX_SEED_LEN),
        ));
    }
    Pubkey::try_find_program_address(seeds, program_id)
        .ok_or_else(|| SettlementError::validation("seeds", "no viable bump seed"))
}

/// First 8 bytes of SHA256("global:<method>")
pub fn instruction_discriminator(method: &str) -> [u8; 8] {
    namespaced_hash("global", method)
}

/// First 8 bytes of SHA256("account:<Name>")
pub fn account_discriminator(name: &str) -> [u8; 8] {
    namespaced_hash("account", name)
}

fn namespaced_hash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Instruction argument, range-checked when encoded.
#[derive(Debug, Clone, Copy)]
pub enum ArgValue<'a> {
    Bytes32(&'a [u8]),
    U8(u64),
    U64(u128),
}

#[derive(Debug, Clone, Copy)]
pub struct InstructionArg<'a> {
    pub name: &'static str,
    pub value: ArgValue<'a>,
}

impl<'a> InstructionArg<'a> {
    pub fn bytes32(name: &'static str, bytes: &'a [u8]) -> Self {
        Self { name, value: ArgValue::Bytes32(bytes) }
    }

    pub fn u8(name: &'static str, value: impl Into<u64>) -> Self {
        Self { name, value: ArgValue::U8(value.into()) }
    }

    pub fn u64(name: &'static str, value: impl Into<u128>) -> Self {
        Self { name, value: ArgValue::U64(value.into()) }
    }
}

/// Discriminator followed by the little-endian arguments, in order.
///
/// Never truncates: a mis-sized or out-of-range argument is a validation
/// error naming the field.
pub fn encode_instruction(method: &str, args: &[InstructionArg<'_>]) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + args.len() * 32);
    data.extend_from_slice(&instruction_discriminator(method));
    for arg in args {
        match arg.value {
            ArgValue::Bytes32(bytes) => {
                if bytes.len() != 32 {
                    return Err(SettlementError::validation(
                        arg.name,
                        format!("expected 32 bytes, got {}", bytes.len()),
                    ));
                }
                data.extend_from_slice(bytes);
            }
            ArgValue::U8(value) => {
                let value = u8::try_from(value).map_err(|_| {
                    SettlementError::validation(arg.name, format!("value {} exceeds u8", value))
                })?;
                data.push(value);
            }
            ArgValue::U64(value) => {
                let value = u64::try_from(value).map_err(|_| {
                    SettlementError::validation(arg.name, format!("value {} exceeds u64", value))
                })?;
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FIELDS: &[FieldSpec] = &[
        FieldSpec::new("owner", FieldKind::Pubkey),
        FieldSpec::new("bps", FieldKind::U16),
        FieldSpec::new("active", FieldKind::Bool),
        FieldSpec::new("at", FieldKind::I64),
    ];
    const SAMPLE: AccountSchema = AccountSchema::new("Sample", SAMPLE_FIELDS);

    #[test]
    fn test_known_discriminators() {
        assert_eq!(hex::encode(instruction_discriminator("submit_signal")), "05f3e1aedd62e828");
        assert_eq!(
            hex::encode(instruction_discriminator("distribute_settlement")),
            "2a4734dc77ada7b7"
        );
        assert_eq!(hex::encode(account_discriminator("ProtocolConfig")), "cf5bfa1c98b3d7d1");
        assert_eq!(hex::encode(account_discriminator("TradeSignal")), "08ed45c6e1670139");
    }

    #[test]
    fn test_min_len() {
        assert_eq!(SAMPLE.min_len(), 8 + 32 + 2 + 1 + 8);
    }

    #[test]
    fn test_decode_reads_fields_in_order() {
        let owner = Pubkey::new_unique();
        let data = SAMPLE
            .encode(&[
                FieldValue::Pubkey(owner),
                FieldValue::U16(1000),
                FieldValue::Bool(true),
                FieldValue::I64(-5),
            ])
            .unwrap();
        let decoded = decode_account(&data, &SAMPLE).unwrap();
        assert_eq!(decoded.pubkey("owner").unwrap(), owner);
        assert_eq!(decoded.u16("bps").unwrap(), 1000);
        assert!(decoded.bool("active").unwrap());
        assert_eq!(decoded.i64("at").unwrap(), -5);
        assert_eq!(&data[40..42], &1000u16.to_le_bytes());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut data = SAMPLE
            .encode(&[
                FieldValue::Pubkey(Pubkey::default()),
                FieldValue::U16(1),
                FieldValue::Bool(false),
                FieldValue::I64(0),
            ])
            .unwrap();
        data.extend_from_slice(&[0xAA; 64]);
        assert!(decode_account(&data, &SAMPLE).is_ok());
    }

    #[test]
    fn test_decode_short_buffer() {
        let data = vec![0u8; SAMPLE.min_len() - 1];
        match decode_account(&data, &SAMPLE) {
            Err(SettlementError::AccountTooShort { account, required, actual }) => {
                assert_eq!(account, "Sample");
                assert_eq!(required, 51);
                assert_eq!(actual, 50);
            }
            other => panic!("expected AccountTooShort, got {:?}", other),
        }
        assert!(decode_account(&[], &SAMPLE).is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_discriminator() {
        let mut data = vec![0u8; SAMPLE.min_len()];
        data[..8].copy_from_slice(&account_discriminator("Other"));
        assert!(matches!(
            decode_account(&data, &SAMPLE),
            Err(SettlementError::MalformedAccount { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_bool() {
        let mut data = SAMPLE
            .encode(&[
                FieldValue::Pubkey(Pubkey::default()),
                FieldValue::U16(1),
                FieldValue::Bool(true),
                FieldValue::I64(0),
            ])
            .unwrap();
        data[8 + 32 + 2] = 2;
        assert!(matches!(
            decode_account(&data, &SAMPLE),
            Err(SettlementError::MalformedAccount { .. })
        ));
    }

    #[test]
    fn test_getter_wrong_kind() {
        let data = SAMPLE
            .encode(&[
                FieldValue::Pubkey(Pubkey::default()),
                FieldValue::U16(1),
                FieldValue::Bool(true),
                FieldValue::I64(0),
            ])
            .unwrap();
        let decoded = decode_account(&data, &SAMPLE).unwrap();
        assert!(decoded.u64("bps").is_err());
        assert!(decoded.get("missing").is_err());
    }

    #[test]
    fn test_encode_rejects_kind_mismatch() {
        let err = SAMPLE
            .encode(&[
                FieldValue::U8(1),
                FieldValue::U16(1),
                FieldValue::Bool(true),
                FieldValue::I64(0),
            ])
            .unwrap_err();
        assert!(matches!(err, SettlementError::MalformedAccount { .. }));
    }

    #[test]
    fn test_encode_instruction_layout() {
        let hash = [7u8; 32];
        let data = encode_instruction(
            "distribute_settlement",
            &[InstructionArg::bytes32("reference", &hash), InstructionArg::u64("amount", 1_000_000u64)],
        )
        .unwrap();
        assert_eq!(data.len(), 8 + 32 + 8);
        assert_eq!(hex::encode(&data[..8]), "2a4734dc77ada7b7");
        assert_eq!(&data[8..40], &hash);
        assert_eq!(&data[40..], &1_000_000u64.to_le_bytes());
    }

    #[test]
    fn test_encode_instruction_range_checks() {
        let short = [1u8; 31];
        let err = encode_instruction("submit_signal", &[InstructionArg::bytes32("result_hash", &short)])
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid result_hash: expected 32 bytes, got 31");

        let err = encode_instruction("submit_signal", &[InstructionArg::u8("risk_flags", 256u64)])
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid risk_flags: value 256 exceeds u8");

        let err = encode_instruction(
            "distribute_settlement",
            &[InstructionArg::u64("amount", u64::MAX as u128 + 1)],
        )
        .unwrap_err();
        assert!(matches!(err, SettlementError::Validation { ref field, .. } if field == "amount"));
    }

    #[test]
    fn test_derive_address_deterministic() {
        let program = Pubkey::new_unique();
        let a = derive_address(&program, &[b"protocol-config"]).unwrap();
        let b = derive_address(&program, &[b"protocol-config"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Pubkey::find_program_address(&[b"protocol-config"], &program));
        let other = derive_address(&Pubkey::new_unique(), &[b"protocol-config"]).unwrap();
        assert_ne!(a.0, other.0);
    }

    #[test]
    fn test_derive_address_rejects_long_seed() {
        let program = Pubkey::new_unique();
        assert!(derive_address(&program, &[&[0u8; 33]]).is_err());
    }
}

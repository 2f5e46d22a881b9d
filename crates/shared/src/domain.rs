use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
pub const SOL_DECIMALS: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Base58Error {
    #[error("{kind} is empty")]
    Empty { kind: &'static str },
    #[error("{kind} is not valid base58: {reason}")]
    Encoding { kind: &'static str, reason: String },
    #[error("{kind} must decode to {expected} bytes, got {actual}")]
    Length {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

macro_rules! base58_newtype {
    ($name:ident, $len:expr, $label:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_bytes(self) -> [u8; $len] {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = Base58Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                if value.is_empty() {
                    return Err(Base58Error::Empty { kind: $label });
                }
                let decoded = bs58::decode(value)
                    .into_vec()
                    .map_err(|err| Base58Error::Encoding {
                        kind: $label,
                        reason: err.to_string(),
                    })?;
                Self::try_from(decoded.as_slice())
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = Base58Error;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| Base58Error::Length {
                    kind: $label,
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(array))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(de::Error::custom)
            }
        }
    };
}

base58_newtype!(Address, 32, "address");
base58_newtype!(Signature, 64, "signature");
base58_newtype!(Blockhash, 32, "blockhash");

impl Address {
    /// The native system program (all-zero key).
    pub const SYSTEM_PROGRAM: Address = Address([0u8; 32]);
}

impl Signature {
    /// Placeholder for a required signature that has not been provided yet.
    pub const fn zeroed() -> Self {
        Self([0u8; 64])
    }

    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }
}

/// Shortened address for display, e.g. `7xKX...sAsU`.
pub fn format_address(address: Option<&Address>) -> String {
    let Some(address) = address else {
        return "Not connected".to_string();
    };
    let full = address.to_string();
    if full.len() <= 8 {
        return full;
    }
    format!("{}...{}", &full[..4], &full[full.len() - 4..])
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount '{0}' is not a number")]
    NotANumber(String),
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount has more than {max} decimal places")]
    TooPrecise { max: usize },
    #[error("amount is too large")]
    Overflow,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Lamports(pub u64);

impl Lamports {
    pub const ZERO: Lamports = Lamports(0);

    /// Parses a decimal SOL amount ("0.1", "2", ".5", "1e-3") into lamports without
    /// going through floating point. Rejects zero, negatives and sub-lamport precision.
    pub fn from_sol_str(input: &str) -> Result<Self, AmountError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(AmountError::Empty);
        }

        let (negative, unsigned) = match raw.as_bytes()[0] {
            b'-' => (true, &raw[1..]),
            b'+' => (false, &raw[1..]),
            _ => (false, raw),
        };
        let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
            Some((mantissa, exponent)) => (
                mantissa,
                exponent
                    .parse::<i64>()
                    .map_err(|_| AmountError::NotANumber(raw.to_string()))?,
            ),
            None => (unsigned, 0),
        };
        let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction)
        {
            return Err(AmountError::NotANumber(raw.to_string()));
        }

        let (whole, fraction) = shift_decimal_point(whole, fraction, exponent)?;
        if fraction.len() > SOL_DECIMALS {
            return Err(AmountError::TooPrecise { max: SOL_DECIMALS });
        }
        let (whole, fraction) = (whole.as_str(), fraction.as_str());

        let whole_lamports = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u64>()
                .map_err(|_| AmountError::Overflow)?
                .checked_mul(LAMPORTS_PER_SOL)
                .ok_or(AmountError::Overflow)?
        };
        let fraction_lamports = if fraction.is_empty() {
            0
        } else {
            format!("{fraction:0<width$}", width = SOL_DECIMALS)
                .parse::<u64>()
                .map_err(|_| AmountError::NotANumber(raw.to_string()))?
        };
        let total = whole_lamports
            .checked_add(fraction_lamports)
            .ok_or(AmountError::Overflow)?;

        if negative || total == 0 {
            return Err(AmountError::NotPositive);
        }
        Ok(Lamports(total))
    }

    pub fn from_sol(sol: f64) -> Option<Self> {
        if !sol.is_finite() || sol < 0.0 {
            return None;
        }
        let lamports = (sol * LAMPORTS_PER_SOL as f64).round();
        (lamports <= u64::MAX as f64).then_some(Lamports(lamports as u64))
    }

    pub fn as_sol(self) -> f64 {
        self.0 as f64 / LAMPORTS_PER_SOL as f64
    }
}

/// Moves the decimal point of `whole.fraction` by `exponent` places and drops
/// trailing fractional zeros, so the result only carries significant digits.
fn shift_decimal_point(
    whole: &str,
    fraction: &str,
    exponent: i64,
) -> Result<(String, String), AmountError> {
    let digits = format!("{whole}{fraction}");
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok((String::new(), String::new()));
    }
    // lamport amounts never need more than 20 integer digits or SOL_DECIMALS places
    if exponent > 64 {
        return Err(AmountError::Overflow);
    }
    if exponent < -64 {
        return Err(AmountError::TooPrecise { max: SOL_DECIMALS });
    }

    let point = whole.len() as i64 + exponent;
    let (whole, mut fraction) = if point <= 0 {
        (String::new(), format!("{}{digits}", "0".repeat(point.unsigned_abs() as usize)))
    } else if point as usize >= digits.len() {
        (format!("{digits:0<width$}", width = point as usize), String::new())
    } else {
        let (head, tail) = digits.split_at(point as usize);
        (head.to_string(), tail.to_string())
    };
    fraction.truncate(fraction.trim_end_matches('0').len());
    Ok((whole, fraction))
}

impl fmt::Display for Lamports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} SOL", self.as_sol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    #[default]
    MainnetBeta,
    Devnet,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::MainnetBeta, Network::Devnet, Network::Testnet];

    pub fn as_str(self) -> &'static str {
        match self {
            Network::MainnetBeta => "mainnet-beta",
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Network::MainnetBeta => "Mainnet Beta",
            Network::Devnet => "Devnet",
            Network::Testnet => "Testnet",
        }
    }

    /// Public cluster endpoint.
    pub fn rpc_url(self) -> &'static str {
        match self {
            Network::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
        }
    }

    pub fn explorer_tx_url(self, signature: &Signature) -> String {
        format!("https://solscan.io/tx/{signature}{}", self.explorer_suffix())
    }

    pub fn explorer_account_url(self, address: &Address) -> String {
        format!("https://solscan.io/account/{address}{}", self.explorer_suffix())
    }

    fn explorer_suffix(self) -> &'static str {
        match self {
            Network::MainnetBeta => "",
            Network::Devnet => "?cluster=devnet",
            Network::Testnet => "?cluster=testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown network '{0}' (expected mainnet-beta, devnet or testnet)")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" | "mainnet_beta" => Ok(Network::MainnetBeta),
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(UnknownNetwork(other.to_string())),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown commitment '{0}' (expected processed, confirmed or finalized)")]
pub struct UnknownCommitment(pub String);

impl FromStr for Commitment {
    type Err = UnknownCommitment;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(UnknownCommitment(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    NativeSigner,
    BridgedSigner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    #[default]
    None,
    Native,
    Bridged,
}

impl From<WalletKind> for ConnectionKind {
    fn from(value: WalletKind) -> Self {
        match value {
            WalletKind::NativeSigner => ConnectionKind::Native,
            WalletKind::BridgedSigner => ConnectionKind::Bridged,
        }
    }
}

//! Conditional escrow script templates
//!
//! ```text
//! OP_SHA256 <H> OP_EQUAL
//! OP_IF
//!     <claim_pubkey>
//! OP_ELSE
//!     <locktime> OP_CHECKLOCKTIMEVERIFY OP_DROP    (timed variant only)
//!     <refund_pubkey>
//! OP_ENDIF
//! OP_CHECKSIG
//! ```
//!
//! The element on top of the spending stack is hashed and compared with the
//! commitment; the comparison result selects the branch, and the common
//! `OP_CHECKSIG` checks the remaining signature against whichever key the
//! branch left on the stack.
//!
//! The untimed variant has no refund deadline. Once it is funded both
//! parties can spend at any moment and whoever is confirmed first wins.
//! Use it only where a timeout is enforced out-of-band.

use crate::config::EscrowConfig;
use crate::crypto::commit;
use crate::error::{Result, ZkcpError};
use crate::types::Commitment;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_ELSE, OP_ENDIF, OP_EQUAL, OP_IF, OP_SHA256,
};
use bitcoin::script::{Builder, Instruction, Script, ScriptBuf};
use bitcoin::secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::instruction_number;

/// Length of a compressed secp256k1 public key
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Refund-branch gating
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscrowVariant {
    /// Refund only once chain height/time reaches `locktime`
    Timed { locktime: u32 },
    /// Both branches always open
    Untimed,
}

impl EscrowVariant {
    pub fn locktime(&self) -> Option<u32> {
        match self {
            EscrowVariant::Timed { locktime } => Some(*locktime),
            EscrowVariant::Untimed => None,
        }
    }
}

/// Validated inputs of an escrow template
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowParams {
    pub commitment: Commitment,
    /// Seller key, authorizes the hash branch
    pub claim_pubkey: PublicKey,
    /// Buyer key, authorizes the refund branch
    pub refund_pubkey: PublicKey,
    pub variant: EscrowVariant,
}

/// An escrow template together with the parameters it encodes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EscrowScript {
    params: EscrowParams,
    template: ScriptBuf,
}

impl EscrowScript {
    pub fn params(&self) -> &EscrowParams {
        &self.params
    }

    pub fn commitment(&self) -> &Commitment {
        &self.params.commitment
    }

    pub fn variant(&self) -> EscrowVariant {
        self.params.variant
    }

    /// The redeem script bytes
    pub fn template(&self) -> &Script {
        &self.template
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.template.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.template.as_bytes())
    }

    /// Human-readable opcode listing
    pub fn to_asm(&self) -> String {
        self.template.to_asm_string()
    }

    /// P2SH output script locking funds to this template
    pub fn script_pubkey(&self) -> ScriptBuf {
        self.template.to_p2sh()
    }

    /// Recover the parameters of a template received from a counterparty.
    ///
    /// Only byte-exact canonical templates are accepted: the parameters are
    /// re-assembled and the result must equal the input.
    pub fn parse(template: &Script) -> Result<Self> {
        let instructions = template
            .instructions()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ZkcpError::UnrecognizedTemplate(e.to_string()))?;

        let (variant, refund_index) = match instructions.len() {
            9 => (EscrowVariant::Untimed, 6),
            12 => {
                let locktime = instructions
                    .get(6)
                    .and_then(instruction_number)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        ZkcpError::UnrecognizedTemplate("malformed locktime".to_string())
                    })?;
                (EscrowVariant::Timed { locktime }, 9)
            }
            n => {
                return Err(ZkcpError::UnrecognizedTemplate(format!(
                    "unexpected instruction count {}",
                    n
                )))
            }
        };

        let params = EscrowParams {
            commitment: Commitment::from_slice(push_at(&instructions, 1)?)?,
            claim_pubkey: parse_public_key(push_at(&instructions, 4)?)?,
            refund_pubkey: parse_public_key(push_at(&instructions, refund_index)?)?,
            variant,
        };

        let rebuilt = assemble(&params);
        if rebuilt.as_bytes() != template.as_bytes() {
            return Err(ZkcpError::UnrecognizedTemplate(
                "template is not in canonical form".to_string(),
            ));
        }
        check_params(&params)?;

        Ok(Self {
            params,
            template: rebuilt,
        })
    }

    /// Parse a hex-encoded template
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)?;
        Self::parse(Script::from_bytes(&bytes))
    }
}

impl fmt::Display for EscrowScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for EscrowScript {
    type Error = ZkcpError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<EscrowScript> for String {
    fn from(script: EscrowScript) -> Self {
        script.to_hex()
    }
}

/// Pair a template with its parameters without validating either
#[cfg(test)]
pub(crate) fn unchecked_script(params: EscrowParams) -> EscrowScript {
    let template = assemble(&params);
    EscrowScript { params, template }
}

fn push_at<'a>(instructions: &[Instruction<'a>], index: usize) -> Result<&'a [u8]> {
    match instructions.get(index) {
        Some(Instruction::PushBytes(bytes)) => Ok(bytes.as_bytes()),
        _ => Err(ZkcpError::UnrecognizedTemplate(format!(
            "expected data push at position {}",
            index
        ))),
    }
}

/// Parse a compressed secp256k1 public key
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    if bytes.len() != COMPRESSED_PUBKEY_LEN {
        return Err(ZkcpError::InvalidPublicKey(format!(
            "expected {} compressed bytes, got {}",
            COMPRESSED_PUBKEY_LEN,
            bytes.len()
        )));
    }
    PublicKey::from_slice(bytes).map_err(|e| ZkcpError::InvalidPublicKey(e.to_string()))
}

/// Builds escrow templates from validated inputs
#[derive(Clone, Debug, Default)]
pub struct ConditionalScriptBuilder {
    config: EscrowConfig,
}

impl ConditionalScriptBuilder {
    pub fn new(config: EscrowConfig) -> Self {
        Self { config }
    }

    /// Validate raw inputs and build the template.
    ///
    /// `locktime: None` selects the untimed variant. A present locktime
    /// must be positive, fit the 32-bit locktime field and be at least the
    /// configured minimum.
    pub fn build(
        &self,
        commitment: &[u8],
        claim_pubkey: &[u8],
        refund_pubkey: &[u8],
        locktime: Option<i64>,
    ) -> Result<EscrowScript> {
        let variant = match locktime {
            None => EscrowVariant::Untimed,
            Some(value) => EscrowVariant::Timed {
                locktime: self.check_locktime(value)?,
            },
        };

        self.build_from_params(EscrowParams {
            commitment: Commitment::from_slice(commitment)?,
            claim_pubkey: parse_public_key(claim_pubkey)?,
            refund_pubkey: parse_public_key(refund_pubkey)?,
            variant,
        })
    }

    /// Build the template from already-typed parameters
    pub fn build_from_params(&self, params: EscrowParams) -> Result<EscrowScript> {
        check_params(&params)?;
        if let EscrowVariant::Timed { locktime } = params.variant {
            self.check_locktime(i64::from(locktime))?;
        }

        let template = assemble(&params);
        tracing::debug!(
            commitment = %params.commitment,
            variant = ?params.variant,
            len = template.len(),
            "escrow template built"
        );

        Ok(EscrowScript { params, template })
    }

    fn check_locktime(&self, value: i64) -> Result<u32> {
        if value <= 0 {
            return Err(ZkcpError::InvalidLocktime(format!(
                "{} is not positive",
                value
            )));
        }
        let locktime = u32::try_from(value).map_err(|_| {
            ZkcpError::InvalidLocktime(format!("{} exceeds the 32-bit locktime field", value))
        })?;
        if locktime < self.config.min_locktime {
            return Err(ZkcpError::InvalidLocktime(format!(
                "{} is below the configured minimum {}",
                locktime, self.config.min_locktime
            )));
        }
        Ok(locktime)
    }
}

/// Checks every template must pass, whether built locally or parsed
fn check_params(params: &EscrowParams) -> Result<()> {
    // the refund witness selects OP_ELSE with an empty push
    if params.commitment == commit(&[]) {
        return Err(ZkcpError::DegenerateCommitment);
    }
    if params.variant.locktime() == Some(0) {
        return Err(ZkcpError::InvalidLocktime("0 is not positive".to_string()));
    }
    Ok(())
}

fn assemble(params: &EscrowParams) -> ScriptBuf {
    let builder = Builder::new()
        .push_opcode(OP_SHA256)
        .push_slice(params.commitment.as_bytes())
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_slice(params.claim_pubkey.serialize())
        .push_opcode(OP_ELSE);

    let builder = match params.variant {
        EscrowVariant::Timed { locktime } => builder
            .push_int(i64::from(locktime))
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP),
        EscrowVariant::Untimed => builder,
    };

    builder
        .push_slice(params.refund_pubkey.serialize())
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

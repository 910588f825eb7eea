//! Spend witnesses for the escrow template
//!
//! The claim witness is the reveal: once the ledger accepts it, `K` sits in
//! the clear in a public input script and the buyer reads it from there.
//! Nothing here signs or checks signatures; the pieces are only laid out in
//! the order the template consumes them.

use crate::crypto::verify_commitment;
use crate::error::{Result, ZkcpError};
use crate::types::{hex_bytes_list, Commitment};
use bitcoin::script::{Builder, Instruction, PushBytes, Script, ScriptBuf};
use serde::{Deserialize, Deserializer, Serialize};

use super::builder::EscrowScript;

/// Which template branch a witness satisfies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Hash branch: reveals the preimage, signed by the claim key
    Claim,
    /// Timeout branch: signed by the refund key
    Refund,
}

/// Stack items plus the redeem script that unlock one escrow output
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpendWitness {
    branch: Branch,
    /// Pushed bottom-first: `[signature, preimage]` or `[signature, <empty>]`
    #[serde(with = "hex_bytes_list")]
    elements: Vec<Vec<u8>>,
    redeem_script: EscrowScript,
}

/// Unvalidated wire form of [`SpendWitness`]
#[derive(Deserialize)]
struct RawSpendWitness {
    branch: Branch,
    #[serde(with = "hex_bytes_list")]
    elements: Vec<Vec<u8>>,
    redeem_script: EscrowScript,
}

impl<'de> Deserialize<'de> for SpendWitness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawSpendWitness::deserialize(deserializer)?;
        SpendWitness::from_raw(raw).map_err(serde::de::Error::custom)
    }
}

impl SpendWitness {
    /// Accept only two elements whose selector agrees with `branch`
    fn from_raw(raw: RawSpendWitness) -> Result<Self> {
        let [_, selector] = raw.elements.as_slice() else {
            return Err(ZkcpError::WitnessEncoding(format!(
                "expected 2 elements, found {}",
                raw.elements.len()
            )));
        };
        let opens = verify_commitment(selector, raw.redeem_script.commitment());
        if opens != (raw.branch == Branch::Claim) {
            return Err(ZkcpError::WitnessEncoding(format!(
                "elements do not select the {:?} branch",
                raw.branch
            )));
        }

        Ok(Self {
            branch: raw.branch,
            elements: raw.elements,
            redeem_script: raw.redeem_script,
        })
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    pub fn elements(&self) -> &[Vec<u8>] {
        &self.elements
    }

    pub fn redeem_script(&self) -> &EscrowScript {
        &self.redeem_script
    }

    pub fn signature(&self) -> &[u8] {
        &self.elements[0]
    }

    /// The secret this witness publishes, if it is a claim
    pub fn revealed_preimage(&self) -> Option<&[u8]> {
        match self.branch {
            Branch::Claim => Some(&self.elements[1]),
            Branch::Refund => None,
        }
    }

    /// Full ordered stack as the ledger sees it, redeem script last
    pub fn stack(&self) -> Vec<Vec<u8>> {
        let mut stack = self.elements.clone();
        stack.push(self.redeem_script.to_bytes());
        stack
    }

    /// Encode as a P2SH input script
    pub fn to_script_sig(&self) -> Result<ScriptBuf> {
        let mut builder = Builder::new();
        for item in self.stack() {
            let push = <&PushBytes>::try_from(item.as_slice())
                .map_err(|e| ZkcpError::WitnessEncoding(e.to_string()))?;
            builder = builder.push_slice(push);
        }
        Ok(builder.into_script())
    }

    /// Decode a published P2SH input script that spends an escrow output
    pub fn from_script_sig(script_sig: &Script) -> Result<Self> {
        let mut pushes = script_sig
            .instructions()
            .map(|instruction| match instruction {
                Ok(Instruction::PushBytes(bytes)) => Ok(bytes.as_bytes().to_vec()),
                Ok(Instruction::Op(op)) => Err(ZkcpError::WitnessEncoding(format!(
                    "unexpected opcode {} in input script",
                    op
                ))),
                Err(e) => Err(ZkcpError::WitnessEncoding(e.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;

        if pushes.len() != 3 {
            return Err(ZkcpError::WitnessEncoding(format!(
                "expected 3 pushes, found {}",
                pushes.len()
            )));
        }

        let redeem_script = EscrowScript::parse(Script::from_bytes(&pushes[2]))?;
        pushes.truncate(2);

        let branch = if verify_commitment(&pushes[1], redeem_script.commitment()) {
            Branch::Claim
        } else {
            Branch::Refund
        };

        Ok(Self {
            branch,
            elements: pushes,
            redeem_script,
        })
    }
}

/// Assembles claim and refund witnesses
pub struct RedemptionBuilder;

impl RedemptionBuilder {
    /// Witness for the hash branch.
    ///
    /// The preimage doubles as the branch selector: the template hashes it and
    /// `OP_IF` branches on the comparison. Whether it actually opens the
    /// commitment, and whether the signature verifies, is decided by the
    /// ledger's evaluator.
    pub fn build_claim(preimage: &[u8], signature: &[u8], script: &EscrowScript) -> SpendWitness {
        tracing::debug!(
            commitment = %script.commitment(),
            preimage_len = preimage.len(),
            "claim witness assembled"
        );

        SpendWitness {
            branch: Branch::Claim,
            elements: vec![signature.to_vec(), preimage.to_vec()],
            redeem_script: script.clone(),
        }
    }

    /// Witness for the refund branch; the empty push hashes to a value that
    /// never equals the commitment, so `OP_IF` falls through to `OP_ELSE`.
    pub fn build_refund(signature: &[u8], script: &EscrowScript) -> SpendWitness {
        tracing::debug!(
            commitment = %script.commitment(),
            variant = ?script.variant(),
            "refund witness assembled"
        );

        SpendWitness {
            branch: Branch::Refund,
            elements: vec![signature.to_vec(), Vec::new()],
            redeem_script: script.clone(),
        }
    }
}

/// Find the pushed value that opens `commitment` in a published input script
pub fn extract_preimage(script_sig: &Script, commitment: &Commitment) -> Option<Vec<u8>> {
    script_sig
        .instructions()
        .map_while(|instruction| instruction.ok())
        .find_map(|instruction| match instruction {
            Instruction::PushBytes(bytes) if verify_commitment(bytes.as_bytes(), commitment) => {
                Some(bytes.as_bytes().to_vec())
            }
            _ => None,
        })
}

//! Reference evaluator for escrow spends
//!
//! Implements the subset of the legacy P2SH interpreter the escrow template
//! touches, so the ledger mock can decide spends the way a node would. It is
//! not a general script engine: any opcode outside the subset fails.

use crate::error::{Result, ZkcpError};
use crate::signer::SignatureVerifier;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CLTV, OP_DROP, OP_ELSE, OP_ENDIF, OP_EQUAL, OP_IF, OP_SHA256,
};
use bitcoin::opcodes::{Class, ClassifyContext};
use bitcoin::script::{Instruction, Script};
use sha2::{Digest, Sha256};

use super::{decode_script_num, MAX_LOCKTIME_NUM_LEN, MAX_PUSH_LEN};

/// Locktime values below this are block heights, above are timestamps
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

const MAX_STACK_DEPTH: usize = 1000;

/// Transaction-level facts the template can observe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpendContext {
    /// `nLockTime` of the spending transaction
    pub lock_time: u32,
    /// Digest the signature must cover
    pub digest: [u8; 32],
}

/// Evaluates a P2SH input script against the output it spends
pub struct ScriptEvaluator<V> {
    verifier: V,
}

impl<V: SignatureVerifier> ScriptEvaluator<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    /// Run the input script and the redeem script it carries.
    ///
    /// `Ok(())` means the spend is valid; every failure is
    /// [`ZkcpError::ScriptEvaluation`] or [`ZkcpError::ScriptHashMismatch`].
    pub fn evaluate(
        &self,
        script_sig: &Script,
        script_pubkey: &Script,
        ctx: &SpendContext,
    ) -> Result<()> {
        let mut stack = Vec::new();
        for instruction in script_sig.instructions() {
            match instruction.map_err(|e| fail(e.to_string()))? {
                Instruction::PushBytes(bytes) => push(&mut stack, bytes.as_bytes().to_vec())?,
                Instruction::Op(op) => match op.classify(ClassifyContext::Legacy) {
                    Class::PushNum(n) => push(&mut stack, encode_num(n))?,
                    _ => return Err(fail(format!("input script is not push-only: {}", op))),
                },
            }
        }

        if !script_pubkey.is_p2sh() {
            return Err(fail("only P2SH outputs are supported"));
        }
        let redeem_bytes = stack
            .pop()
            .ok_or_else(|| fail("input script is empty"))?;
        let redeem_script = Script::from_bytes(&redeem_bytes);
        if redeem_script.to_p2sh().as_script() != script_pubkey {
            return Err(ZkcpError::ScriptHashMismatch(
                "redeem script does not hash to the output".to_string(),
            ));
        }

        self.execute(redeem_script, stack, ctx)
    }

    /// Execute `script` over an initial stack
    pub fn execute(&self, script: &Script, mut stack: Vec<Vec<u8>>, ctx: &SpendContext) -> Result<()> {
        stack.iter().try_for_each(|item| check_element(item))?;
        let mut exec: Vec<bool> = Vec::new();

        for instruction in script.instructions() {
            let instruction = instruction.map_err(|e| fail(e.to_string()))?;
            let executing = exec.iter().all(|&branch| branch);

            let op = match instruction {
                Instruction::PushBytes(bytes) => {
                    if executing {
                        push(&mut stack, bytes.as_bytes().to_vec())?;
                    }
                    continue;
                }
                Instruction::Op(op) => op,
            };

            // Conditionals are tracked even inside skipped branches
            if op == OP_IF {
                let taken = if executing {
                    cast_to_bool(&pop(&mut stack)?)
                } else {
                    false
                };
                exec.push(taken);
                continue;
            }
            if op == OP_ELSE {
                let top = exec.last_mut().ok_or_else(|| fail("OP_ELSE without OP_IF"))?;
                *top = !*top;
                continue;
            }
            if op == OP_ENDIF {
                exec.pop().ok_or_else(|| fail("OP_ENDIF without OP_IF"))?;
                continue;
            }
            if !executing {
                continue;
            }

            if let Class::PushNum(n) = op.classify(ClassifyContext::Legacy) {
                push(&mut stack, encode_num(n))?;
            } else if op == OP_SHA256 {
                let data = pop(&mut stack)?;
                push(&mut stack, Sha256::digest(&data).to_vec())?;
            } else if op == OP_EQUAL {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                push(&mut stack, bool_item(a == b))?;
            } else if op == OP_DROP {
                pop(&mut stack)?;
            } else if op == OP_CLTV {
                let operand = stack.last().ok_or_else(|| fail("stack underflow"))?;
                check_locktime(operand, ctx.lock_time)?;
            } else if op == OP_CHECKSIG {
                let pubkey = pop(&mut stack)?;
                let signature = pop(&mut stack)?;
                let valid = self.verifier.verify(&ctx.digest, &signature, &pubkey);
                push(&mut stack, bool_item(valid))?;
            } else {
                return Err(fail(format!("unsupported opcode {}", op)));
            }
        }

        if !exec.is_empty() {
            return Err(fail("unbalanced conditional"));
        }
        match stack.as_slice() {
            [top] if cast_to_bool(top) => Ok(()),
            [_] => Err(fail("script evaluated to false")),
            [] => Err(fail("stack empty at end of execution")),
            _ => Err(fail("extra items left on the stack")),
        }
    }
}

fn check_locktime(operand: &[u8], tx_lock_time: u32) -> Result<()> {
    let required =
        decode_script_num(operand, MAX_LOCKTIME_NUM_LEN).ok_or_else(|| fail("bad locktime operand"))?;
    if required < 0 {
        return Err(fail("negative locktime"));
    }
    let threshold = i64::from(LOCKTIME_THRESHOLD);
    let tx_lock_time = i64::from(tx_lock_time);
    if (required < threshold) != (tx_lock_time < threshold) {
        return Err(fail("locktime type mismatch"));
    }
    if tx_lock_time < required {
        return Err(fail(format!(
            "locktime {} not reached (spend lock_time {})",
            required, tx_lock_time
        )));
    }
    Ok(())
}

fn fail(reason: impl Into<String>) -> ZkcpError {
    ZkcpError::ScriptEvaluation(reason.into())
}

fn push(stack: &mut Vec<Vec<u8>>, item: Vec<u8>) -> Result<()> {
    if stack.len() >= MAX_STACK_DEPTH {
        return Err(fail("stack overflow"));
    }
    check_element(&item)?;
    stack.push(item);
    Ok(())
}

fn check_element(item: &[u8]) -> Result<()> {
    if item.len() > MAX_PUSH_LEN {
        return Err(fail(format!(
            "stack element of {} bytes exceeds {}",
            item.len(),
            MAX_PUSH_LEN
        )));
    }
    Ok(())
}

fn pop(stack: &mut Vec<Vec<u8>>) -> Result<Vec<u8>> {
    stack.pop().ok_or_else(|| fail("stack underflow"))
}

fn bool_item(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

// Any non-zero byte is true, except a lone sign bit in the last position
fn cast_to_bool(item: &[u8]) -> bool {
    match item.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&b| b != 0) || (last != 0 && last != 0x80),
    }
}

fn encode_num(n: i32) -> Vec<u8> {
    match n {
        0 => Vec::new(),
        -1 => vec![0x81],
        // OP_1..OP_16
        _ => vec![n as u8],
    }
}

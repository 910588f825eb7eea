//! Escrow script templates, spend witnesses and a reference evaluator

pub mod builder;
pub mod interpreter;
pub mod redeem;

pub use builder::{
    parse_public_key, ConditionalScriptBuilder, EscrowParams, EscrowScript, EscrowVariant,
};
pub use interpreter::{ScriptEvaluator, SpendContext};
pub use redeem::{extract_preimage, Branch, RedemptionBuilder, SpendWitness};

use bitcoin::opcodes::{Class, ClassifyContext};
use bitcoin::script::Instruction;

/// Largest element a script may push or leave on the stack
pub const MAX_PUSH_LEN: usize = 520;

/// Widest number CHECKLOCKTIMEVERIFY accepts as an operand
pub(crate) const MAX_LOCKTIME_NUM_LEN: usize = 5;

/// Numeric value of a push instruction (`OP_1NEGATE`, `OP_1`..`OP_16` or a
/// script-number push of up to five bytes)
pub(crate) fn instruction_number(instruction: &Instruction) -> Option<i64> {
    match instruction {
        Instruction::PushBytes(bytes) => decode_script_num(bytes.as_bytes(), MAX_LOCKTIME_NUM_LEN),
        Instruction::Op(op) => match op.classify(ClassifyContext::Legacy) {
            Class::PushNum(n) => Some(i64::from(n)),
            _ => None,
        },
    }
}

/// Decode a little-endian sign-magnitude script number.
///
/// Rejects values wider than `max_len` and non-minimal encodings.
pub(crate) fn decode_script_num(bytes: &[u8], max_len: usize) -> Option<i64> {
    if bytes.len() > max_len {
        return None;
    }
    let Some(&last) = bytes.last() else {
        return Some(0);
    };
    // a trailing 0x00/0x80 is only allowed when it carries the sign bit
    if last & 0x7f == 0 && (bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0) {
        return None;
    }

    let mut value: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        value |= i64::from(*byte) << (8 * i);
    }
    if last & 0x80 != 0 {
        let sign_bit = 0x80i64 << (8 * (bytes.len() - 1));
        Some(-(value & !sign_bit))
    } else {
        Some(value)
    }
}

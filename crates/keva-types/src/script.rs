//! Raw operation scripts and the blocks that carry them.
//!
//! Ledger transactions embed key-value operations as an opcode followed by
//! pushed arguments. Decoding is lenient by contract: anything that does not
//! parse as a well-formed operation is treated as "no operation" and skipped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::namespace::NamespaceId;
use crate::op::{LedgerOp, OpId, Operation};

pub const OP_KEVA_NAMESPACE: u8 = 0xd0;
pub const OP_KEVA_PUT: u8 = 0xd1;
pub const OP_KEVA_DELETE: u8 = 0xd2;

/// An undecoded operation output: opcode plus pushed arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpScript {
    pub opcode: u8,
    pub args: Vec<Vec<u8>>,
}

impl OpScript {
    /// Encode an operation as a script.
    pub fn encode(op: &Operation) -> Self {
        match op {
            Operation::CreateNamespace {
                namespace,
                display_name,
            } => Self {
                opcode: OP_KEVA_NAMESPACE,
                args: vec![namespace.as_bytes().to_vec(), display_name.as_bytes().to_vec()],
            },
            Operation::Put {
                namespace,
                key,
                value,
            } => Self {
                opcode: OP_KEVA_PUT,
                args: vec![
                    namespace.as_bytes().to_vec(),
                    key.as_bytes().to_vec(),
                    value.as_bytes().to_vec(),
                ],
            },
            Operation::Delete { namespace, key } => Self {
                opcode: OP_KEVA_DELETE,
                args: vec![namespace.as_bytes().to_vec(), key.as_bytes().to_vec()],
            },
        }
    }

    /// Decode into an operation. Returns `None` for anything malformed:
    /// unknown opcode, wrong argument count, a namespace that is not 32
    /// bytes, or text arguments that are not UTF-8.
    pub fn decode(&self) -> Option<Operation> {
        let arity = match self.opcode {
            OP_KEVA_NAMESPACE | OP_KEVA_DELETE => 2,
            OP_KEVA_PUT => 3,
            _ => return None,
        };
        if self.args.len() != arity {
            return None;
        }

        let raw: [u8; 32] = self.args[0].as_slice().try_into().ok()?;
        let namespace = NamespaceId::from_raw(raw);
        let text = |i: usize| String::from_utf8(self.args[i].clone()).ok();

        match self.opcode {
            OP_KEVA_NAMESPACE => Some(Operation::CreateNamespace {
                namespace,
                display_name: text(1)?,
            }),
            OP_KEVA_PUT => Some(Operation::Put {
                namespace,
                key: text(1)?,
                value: text(2)?,
            }),
            _ => Some(Operation::Delete {
                namespace,
                key: text(1)?,
            }),
        }
    }
}

/// A ledger transaction as seen by the projection engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTx {
    pub id: OpId,
    pub outputs: Vec<OpScript>,
}

/// A connected block: its height and the operations it carries, in
/// transaction order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub ops: Vec<LedgerOp>,
}

impl Block {
    pub fn new(height: u64, ops: Vec<LedgerOp>) -> Self {
        Self { height, ops }
    }

    /// Extract the operations of each transaction, in order. Outputs that do
    /// not decode are skipped.
    pub fn from_transactions(height: u64, txs: &[LedgerTx]) -> Self {
        let mut ops = Vec::new();
        for tx in txs {
            for (index, output) in tx.outputs.iter().enumerate() {
                match output.decode() {
                    Some(op) => ops.push(LedgerOp::new(tx.id, op)),
                    None => {
                        debug!(tx = %tx.id.short_hex(), output = index, "skipping malformed operation script");
                    }
                }
            }
        }
        Self { height, ops }
    }
}

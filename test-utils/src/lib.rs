//! Test helpers: a small revm harness for executing compiled bytecode, and
//! byte-level assertion helpers with hex diffs.

use alloy_primitives::hex;
use revm::{
    primitives::{
        address, keccak256, AccountInfo, Bytecode, ExecutionResult, TransactTo, U256, KECCAK_EMPTY,
    },
    Evm, InMemoryDB,
};

/// Builds a one-contract EVM: the bytecode under test is deployed as-is (no
/// constructor semantics) and called once with the given calldata.
pub struct EvmBuilder {
    db: InMemoryDB,
    contract_address: revm::primitives::Address,
    caller_address: revm::primitives::Address,
    bytecode: Vec<u8>,
    calldata: Vec<u8>,
    gas_limit: u64,
}

impl EvmBuilder {
    pub fn new() -> Self {
        Self {
            db: InMemoryDB::default(),
            contract_address: address!("1000000000000000000000000000000000000000"),
            caller_address: address!("9000000000000000000000000000000000000000"),
            bytecode: Vec::new(),
            calldata: Vec::new(),
            gas_limit: 30_000_000,
        }
    }

    pub fn with_bytecode(mut self, bytecode: Vec<u8>) -> Self {
        self.bytecode = bytecode;
        self
    }

    pub fn with_calldata(mut self, calldata: Vec<u8>) -> Self {
        self.calldata = calldata;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn build(mut self) -> Evm<'static, (), InMemoryDB> {
        self.db.insert_account_info(
            self.contract_address,
            AccountInfo {
                balance: U256::ZERO,
                nonce: 0,
                code_hash: keccak256(&self.bytecode),
                code: Some(Bytecode::new_raw(self.bytecode.clone().into())),
            },
        );

        self.db.insert_account_info(
            self.caller_address,
            AccountInfo {
                balance: U256::from(1_000_000_000_000_000_000u64),
                nonce: 0,
                code_hash: KECCAK_EMPTY,
                code: None,
            },
        );

        Evm::builder()
            .with_db(self.db)
            .modify_tx_env(|tx| {
                tx.caller = self.caller_address;
                tx.transact_to = TransactTo::Call(self.contract_address);
                tx.data = self.calldata.into();
                tx.gas_limit = self.gas_limit;
                tx.gas_price = U256::from(1);
                tx.value = U256::ZERO;
            })
            .build()
    }
}

impl Default for EvmBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the bytecode with the given calldata and returns its return data.
/// Reverts and halts are reported as errors.
pub fn execute_bytecode(bytecode: &[u8], calldata: &[u8]) -> Result<Vec<u8>, String> {
    let mut evm = EvmBuilder::new()
        .with_bytecode(bytecode.to_vec())
        .with_calldata(calldata.to_vec())
        .build();

    let result = evm.transact_commit().map_err(|e| format!("execution error: {e:?}"))?;
    match result {
        ExecutionResult::Success { output, .. } => Ok(output.into_data().to_vec()),
        ExecutionResult::Revert { output, .. } => {
            Err(format!("reverted with 0x{}", hex::encode(output)))
        }
        ExecutionResult::Halt { reason, .. } => Err(format!("halted: {reason:?}")),
    }
}

/// Asserts two byte strings are equal, panicking with both rendered as hex.
#[track_caller]
pub fn assert_bytes_eq(got: &[u8], want: &[u8], context: &str) {
    assert!(
        got == want,
        "{context} mismatch\n got: 0x{}\nwant: 0x{}",
        hex::encode(got),
        hex::encode(want),
    );
}

/// Asserts bytes against an expected hex string (with or without `0x`).
#[track_caller]
pub fn assert_bytecode_hex(got: &[u8], want_hex: &str) {
    let want = hex::decode(want_hex.trim_start_matches("0x"))
        .unwrap_or_else(|e| panic!("bad expected hex {want_hex:?}: {e}"));
    assert_bytes_eq(got, &want, "bytecode");
}

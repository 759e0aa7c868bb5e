//! EIP-712 hashing for EIP-3009 `TransferWithAuthorization`.

use alloy_primitives::{keccak256, Address, B256, U256};

const DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const TRANSFER_WITH_AUTHORIZATION_TYPE: &[u8] = b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)";

/// EIP-712 domain of the token contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn separator(&self) -> B256 {
        let mut encoded = Vec::with_capacity(160);
        encoded.extend_from_slice(keccak256(DOMAIN_TYPE).as_slice());
        encoded.extend_from_slice(keccak256(self.name.as_bytes()).as_slice());
        encoded.extend_from_slice(keccak256(self.version.as_bytes()).as_slice());
        encoded.extend_from_slice(&U256::from(self.chain_id).to_be_bytes::<32>());
        push_address(&mut encoded, &self.verifying_contract);
        keccak256(&encoded)
    }
}

/// EIP-3009 transfer authorization message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferWithAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: u64,
    pub valid_before: u64,
    pub nonce: B256,
}

impl TransferWithAuthorization {
    pub fn struct_hash(&self) -> B256 {
        let mut encoded = Vec::with_capacity(224);
        encoded.extend_from_slice(keccak256(TRANSFER_WITH_AUTHORIZATION_TYPE).as_slice());
        push_address(&mut encoded, &self.from);
        push_address(&mut encoded, &self.to);
        encoded.extend_from_slice(&self.value.to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(self.valid_after).to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(self.valid_before).to_be_bytes::<32>());
        encoded.extend_from_slice(self.nonce.as_slice());
        keccak256(&encoded)
    }

    /// `keccak256("\x19\x01" || domainSeparator || structHash)`
    pub fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        let mut encoded = Vec::with_capacity(66);
        encoded.extend_from_slice(b"\x19\x01");
        encoded.extend_from_slice(domain.separator().as_slice());
        encoded.extend_from_slice(self.struct_hash().as_slice());
        keccak256(&encoded)
    }
}

// Addresses are left-padded to a 32-byte word.
fn push_address(encoded: &mut Vec<u8>, address: &Address) {
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(address.as_slice());
}

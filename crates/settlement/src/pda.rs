//! Program-derived addresses for the settlement program

use solana_sdk::pubkey::Pubkey;
use tradegate_core::{AgentId, TradeReference};

use crate::codec::derive_address;
use crate::Result;

/// SPL Associated Token Account program: ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131,
    11, 90, 19, 153, 218, 255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// SPL Token program: TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA
pub const TOKEN_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172,
    28, 180, 133, 237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

mod seed {
    pub const PROTOCOL_CONFIG: &[u8] = b"protocol-config";
    pub const AGENT: &[u8] = b"agent";
    pub const ROLE: &[u8] = b"role";
    pub const SPLIT: &[u8] = b"split";
    pub const SIGNAL: &[u8] = b"signal";
    pub const RECEIPT: &[u8] = b"receipt";
    pub const VAULT_AUTHORITY: &[u8] = b"vault-authority";
}

/// Role assigned to a broadcaster by the program admin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    Signaler = 3,
    RevenueOperator = 4,
}

/// Address book for one deployment of the settlement program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddresses {
    program_id: Pubkey,
}

impl ProgramAddresses {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    /// ["protocol-config"]
    pub fn protocol_config(&self) -> Result<Pubkey> {
        self.find(&[seed::PROTOCOL_CONFIG])
    }

    /// ["agent", agent_id as u64 LE]
    pub fn agent_identity(&self, agent_id: AgentId) -> Result<Pubkey> {
        self.find(&[seed::AGENT, &agent_id.to_le_bytes()])
    }

    /// ["role", [role], member]
    pub fn role_assignment(&self, role: Role, member: &Pubkey) -> Result<Pubkey> {
        self.find(&[seed::ROLE, &[role as u8], member.as_ref()])
    }

    /// ["split", agent_identity]
    pub fn split_config(&self, agent_identity: &Pubkey) -> Result<Pubkey> {
        self.find(&[seed::SPLIT, agent_identity.as_ref()])
    }

    /// ["signal", agent_identity, trade_hash]
    pub fn trade_signal(&self, agent_identity: &Pubkey, trade: &TradeReference) -> Result<Pubkey> {
        self.find(&[seed::SIGNAL, agent_identity.as_ref(), trade.as_bytes()])
    }

    /// ["receipt", agent_identity, reference]
    pub fn distribution_receipt(&self, agent_identity: &Pubkey, reference: &TradeReference) -> Result<Pubkey> {
        self.find(&[seed::RECEIPT, agent_identity.as_ref(), reference.as_bytes()])
    }

    /// ["vault-authority"]
    pub fn vault_authority(&self) -> Result<Pubkey> {
        self.find(&[seed::VAULT_AUTHORITY])
    }

    fn find(&self, seeds: &[&[u8]]) -> Result<Pubkey> {
        derive_address(&self.program_id, seeds).map(|(address, _bump)| address)
    }
}

/// Associated token account for `wallet` holding `mint`.
///
/// ATA PDA = find_program_address(
///   [wallet, token_program, mint],
///   ASSOCIATED_TOKEN_PROGRAM_ID,
/// )
///
/// Off-curve owners (PDAs such as a reserve vault) are allowed.
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Result<Pubkey> {
    derive_address(
        &ASSOCIATED_TOKEN_PROGRAM_ID,
        &[wallet.as_ref(), token_program.as_ref(), mint.as_ref()],
    )
    .map(|(address, _bump)| address)
}

//! Safe address command implementation

use crate::relayer::derive_safe_address;
use crate::signing::parse_private_key;
use clap::Args;

#[derive(Args, Debug)]
pub struct SafeAddressArgs {
    /// Owner private key (hex, with or without 0x)
    #[arg(long)]
    pub key: String,
}

impl SafeAddressArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let owner = parse_private_key(&self.key)?.address();
        println!("owner: {owner}");
        println!("safe:  {}", derive_safe_address(owner));
        Ok(())
    }
}

//! Wallet V4R2 implementation

use std::sync::Arc;

use ton_cell::{Address, Cell, CellBuilder};
use ton_crypto::Ed25519Keypair;

use crate::codes::wallet_v4r2_code;
use crate::error::{WalletError, WalletResult};
use crate::transfer::Transfer;
use crate::wallet::Wallet;

/// Default subwallet id; the workchain is added on top.
pub const DEFAULT_SUBWALLET_ID: u32 = 698_983_191;

/// Outgoing messages a single V4R2 external message may carry.
pub const MAX_TRANSFERS: usize = 4;

/// Wallet V4 revision 2
pub struct WalletV4R2 {
    keypair: Ed25519Keypair,
    workchain: i8,
    subwallet_id: u32,
    address: Address,
}

impl WalletV4R2 {
    /// Create a wallet with the default subwallet id for `workchain`.
    pub fn new(keypair: Ed25519Keypair, workchain: i8) -> WalletResult<Self> {
        let subwallet_id = DEFAULT_SUBWALLET_ID.wrapping_add(workchain as i32 as u32);
        Self::with_subwallet(keypair, workchain, subwallet_id)
    }

    pub fn with_subwallet(
        keypair: Ed25519Keypair,
        workchain: i8,
        subwallet_id: u32,
    ) -> WalletResult<Self> {
        let address = Self::calculate_address(&keypair.public_key, workchain, subwallet_id)?;
        Ok(Self {
            keypair,
            workchain,
            subwallet_id,
            address,
        })
    }

    /// Address of the contract a given key deploys to: the state init hash.
    pub fn calculate_address(
        pubkey: &[u8; 32],
        workchain: i8,
        subwallet_id: u32,
    ) -> WalletResult<Address> {
        let state_init = Self::build_state_init(pubkey, subwallet_id)?;
        Ok(Address::new(workchain, state_init.hash()))
    }

    fn build_state_init(pubkey: &[u8; 32], subwallet_id: u32) -> WalletResult<Cell> {
        let code = wallet_v4r2_code()?;

        // seqno:32 subwallet_id:32 public_key:256 plugins:(HashmapE 256 int1)
        let mut data = CellBuilder::new();
        data.store_u32(0)?;
        data.store_u32(subwallet_id)?;
        data.store_bytes(pubkey)?;
        data.store_bit(false)?;
        let data = data.build()?;

        // split_depth:none special:none code:^Cell data:^Cell library:none
        let mut state_init = CellBuilder::new();
        state_init.store_uint(0b00110, 5)?;
        state_init.store_ref(code)?;
        state_init.store_ref(Arc::new(data))?;
        state_init.build().map_err(Into::into)
    }

    pub fn subwallet_id(&self) -> u32 {
        self.subwallet_id
    }

    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    /// Signing key of this wallet, for proofs made outside a transfer.
    pub fn keypair(&self) -> &Ed25519Keypair {
        &self.keypair
    }

    /// `int_msg_info$0 ihr_disabled:1 bounce bounced:0 src:addr_none dest value
    /// ihr_fee:0 fwd_fee:0 created_lt:0 created_at:0 init:none body:(Maybe ^Cell)`
    fn build_internal_message(transfer: &Transfer) -> WalletResult<Cell> {
        let mut builder = CellBuilder::new();

        builder.store_bit(false)?;
        builder.store_bit(true)?;
        builder.store_bit(transfer.bounce)?;
        builder.store_bit(false)?;

        builder.store_address_none()?;
        builder.store_address(&transfer.to)?;
        builder.store_coins(transfer.amount)?;
        builder.store_bit(false)?; // no extra currencies

        builder.store_coins(0)?;
        builder.store_coins(0)?;
        builder.store_u64(0)?;
        builder.store_u32(0)?;

        builder.store_bit(false)?;
        builder.store_maybe_ref(transfer.payload.clone())?;

        builder.build().map_err(Into::into)
    }
}

impl Wallet for WalletV4R2 {
    fn version(&self) -> &'static str {
        "v4r2"
    }

    fn address(&self) -> &Address {
        &self.address
    }

    fn public_key(&self) -> &[u8; 32] {
        &self.keypair.public_key
    }

    fn state_init(&self) -> WalletResult<Cell> {
        Self::build_state_init(&self.keypair.public_key, self.subwallet_id)
    }

    fn create_transfer_body(
        &self,
        seqno: u32,
        transfers: &[Transfer],
        valid_until: u32,
    ) -> WalletResult<Cell> {
        if transfers.len() > MAX_TRANSFERS {
            return Err(WalletError::TooManyTransfers {
                max: MAX_TRANSFERS,
                got: transfers.len(),
            });
        }

        let mut builder = CellBuilder::new();

        // subwallet_id:32 valid_until:32 seqno:32 op:8 (mode:8 message:^Cell)*
        builder.store_u32(self.subwallet_id)?;
        builder.store_u32(valid_until)?;
        builder.store_u32(seqno)?;
        builder.store_u8(0)?;

        for transfer in transfers {
            builder.store_u8(transfer.mode)?;
            builder.store_ref(Arc::new(Self::build_internal_message(transfer)?))?;
        }

        builder.build().map_err(Into::into)
    }

    fn sign(&self, body: &Cell) -> WalletResult<Cell> {
        let signature = self.keypair.sign(&body.hash());

        let mut builder = CellBuilder::new();
        builder.store_bytes(&signature)?;
        builder.store_cell(body)?;
        builder.build().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::build_comment;
    use ton_cell::CellSlice;

    const RFC8032_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
    const DEST: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    fn wallet() -> WalletV4R2 {
        let seed = hex::decode(RFC8032_SEED).unwrap();
        WalletV4R2::new(Ed25519Keypair::from_bytes(&seed).unwrap(), 0).unwrap()
    }

    fn transfer() -> Transfer {
        Transfer::new(Address::parse(DEST).unwrap(), 1_000_000_000)
            .with_payload(Arc::new(build_comment("hi").unwrap()))
    }

    #[test]
    fn test_known_address() {
        let wallet = wallet();
        assert_eq!(wallet.version(), "v4r2");
        assert_eq!(wallet.subwallet_id(), DEFAULT_SUBWALLET_ID);
        assert_eq!(
            wallet.address().to_raw(),
            "0:cdac97c9162b2e141ad4463828b2a70efdf8762b97e83563f352becf902e88a6"
        );
    }

    #[test]
    fn test_masterchain_subwallet() {
        let seed = hex::decode(RFC8032_SEED).unwrap();
        let wallet = WalletV4R2::new(Ed25519Keypair::from_bytes(&seed).unwrap(), -1).unwrap();
        assert_eq!(wallet.subwallet_id(), DEFAULT_SUBWALLET_ID - 1);
        assert_eq!(wallet.address().workchain, -1);
    }

    #[test]
    fn test_signed_transfer_hashes() {
        let wallet = wallet();
        let transfers = [transfer()];

        let body = wallet.create_transfer_body(1, &transfers, 1_700_000_000).unwrap();
        assert_eq!(
            body.hash_hex(),
            "6412a16855dea255d06514b77249aea2a40e3a9a8cd69b160b16212de2c73512"
        );

        let message = wallet.create_signed_transfer(1, &transfers, 1_700_000_000).unwrap();
        assert_eq!(message.reference_count(), 1);
        assert_eq!(
            message.hash_hex(),
            "02b6dac1a30a3c235e0647cf52da54abf8b9a4d30910ef976d3ae6f66f04a0b2"
        );
    }

    #[test]
    fn test_first_transfer_carries_state_init() {
        let wallet = wallet();
        let message = wallet
            .create_signed_transfer(0, &[transfer()], 1_700_000_000)
            .unwrap();

        assert_eq!(message.reference_count(), 2);
        assert_eq!(
            message.reference(0).unwrap().hash(),
            wallet.state_init().unwrap().hash()
        );
        assert_eq!(
            message.hash_hex(),
            "98a55d9cbd85399931b34918e4a22884a00f453082fbe6101bd3da2fa63a79cd"
        );
    }

    #[test]
    fn test_signature_covers_body_hash() {
        let wallet = wallet();
        let body = wallet.create_transfer_body(5, &[transfer()], u32::MAX).unwrap();
        let signed = wallet.sign(&body).unwrap();

        let mut slice = CellSlice::new(&signed);
        let signature: [u8; 64] = slice.load_bytes(64).unwrap().try_into().unwrap();
        assert!(
            ton_crypto::verify_signature(wallet.public_key(), &body.hash(), &signature).is_ok()
        );
        assert_eq!(slice.load_u32().unwrap(), DEFAULT_SUBWALLET_ID);
        assert_eq!(slice.load_u32().unwrap(), u32::MAX);
        assert_eq!(slice.load_u32().unwrap(), 5);
    }

    #[test]
    fn test_internal_message_layout() {
        let message = WalletV4R2::build_internal_message(&transfer().with_bounce(false)).unwrap();
        let mut slice = CellSlice::new(&message);

        assert!(!slice.load_bit().unwrap());
        assert!(slice.load_bit().unwrap());
        assert!(!slice.load_bit().unwrap());
        assert!(!slice.load_bit().unwrap());
        assert_eq!(slice.load_address().unwrap(), None);
        assert_eq!(slice.load_address().unwrap(), Some(Address::parse(DEST).unwrap()));
        assert_eq!(slice.load_coins().unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_too_many_transfers() {
        let wallet = wallet();
        let transfers = vec![transfer(); MAX_TRANSFERS + 1];
        assert!(matches!(
            wallet.create_transfer_body(1, &transfers, u32::MAX),
            Err(WalletError::TooManyTransfers { max: 4, got: 5 })
        ));
    }
}

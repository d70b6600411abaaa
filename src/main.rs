// Confidential swap node
// Key generation, circuit setup, an end-to-end demo and state inspection

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use confidential_swap::ledger::{allowance_key, balance_key};
use confidential_swap::storage::{read_record, Namespace};
use confidential_swap::swap::offer::offer_key;
use confidential_swap::wallet::{exact_sell_amount, public_credit};
use confidential_swap::zkp::trusted_setup::{CeremonyConfig, TrustedSetupCeremony};
use confidential_swap::*;
use rand::rngs::OsRng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "swap-node")]
struct Cli {
    /// Optional JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a BabyJubJub keypair
    Keygen {
        /// Write the keypair as JSON instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the Groth16 setup for every circuit
    Setup {
        /// Directory for proving and verifying keys
        #[arg(short, long)]
        keys_dir: Option<PathBuf>,
    },
    /// Run an offer and an allowance scenario against a fresh ledger
    Demo {
        #[arg(short, long)]
        keys_dir: Option<PathBuf>,
    },
    /// Inspect records in a sled data directory
    Inspect {
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// What to inspect: stats, offers, offer, allowance, balance
        #[arg(short, long, default_value = "stats")]
        target: String,
        /// Offer id
        #[arg(long)]
        id: Option<OfferId>,
        /// Account (balance) or owner (allowance), 0x hex
        #[arg(long)]
        account: Option<String>,
        /// Spender for allowance lookups, 0x hex
        #[arg(long)]
        spender: Option<String>,
        /// Asset address, 0x hex
        #[arg(long)]
        asset: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SwapConfig::load(path).await?,
        None => SwapConfig::default(),
    };

    match cli.command {
        Commands::Keygen { output } => generate_keys(output).await,
        Commands::Setup { keys_dir } => {
            run_setup(keys_dir.unwrap_or(config.keys_dir)).await
        }
        Commands::Demo { keys_dir } => {
            let keys_dir = keys_dir.unwrap_or_else(|| config.keys_dir.clone());
            run_demo(&config, &keys_dir).await
        }
        Commands::Inspect { data_dir, target, id, account, spender, asset } => {
            let data_dir = data_dir.unwrap_or(config.data_dir);
            inspect_state(&data_dir, &target, id, account, spender, asset)
        }
    }
}

async fn generate_keys(output: Option<PathBuf>) -> Result<()> {
    let keys = KeyPair::generate(&mut OsRng);
    let json = serde_json::json!({
        "secret_key": keys.secret_key.to_hex(),
        "public_key": keys.public_key.to_hex(),
    });

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, serde_json::to_string_pretty(&json)?).await?;
            info!("🔑 Keypair written to {:?}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(&json)?),
    }
    Ok(())
}

async fn run_setup(keys_dir: PathBuf) -> Result<()> {
    info!("🔐 Running circuit setup into {:?}", keys_dir);
    let mut ceremony = TrustedSetupCeremony::new(keys_dir, CeremonyConfig::default());
    let transcript = ceremony.run_ceremony(&mut OsRng).await?;
    for contribution in &transcript.contributions {
        info!("   • {}: vk {}", contribution.circuit, contribution.vk_hash);
    }

    if ceremony.verify_ceremony().await? {
        info!("✅ Ceremony {} verified", transcript.ceremony_id);
        Ok(())
    } else {
        error!("❌ Ceremony {} failed verification", transcript.ceremony_id);
        Err(SwapError::Config("ceremony verification failed".to_string()))
    }
}

async fn ensure_keys(keys_dir: &Path) -> Result<()> {
    let ceremony = TrustedSetupCeremony::new(keys_dir.to_path_buf(), CeremonyConfig::default());
    if CircuitKind::ALL.iter().all(|kind| ceremony.keys_exist(*kind)) {
        return Ok(());
    }
    warn!("Circuit keys missing in {:?}, running setup first", keys_dir);
    run_setup(keys_dir.to_path_buf()).await
}

async fn run_demo(config: &SwapConfig, keys_dir: &Path) -> Result<()> {
    ensure_keys(keys_dir).await?;
    let backend = Arc::new(Groth16Backend::load_dir(keys_dir).await?);
    let verifiers = Arc::new(VerifierSet::load_dir(keys_dir).await?);
    let mut rng = OsRng;

    let eur = Address::from_label("eur");
    let usd = Address::from_label("usd");
    let alice = Address::from_label("alice");
    let bob = Address::from_label("bob");
    let carol = Address::from_label("carol");

    let alice_wallet = Wallet::new(KeyPair::generate(&mut rng), backend.clone()).with_dlog_bound(config.dlog_bound);
    let bob_wallet = Wallet::new(KeyPair::generate(&mut rng), backend.clone()).with_dlog_bound(config.dlog_bound);
    let carol_wallet = Wallet::new(KeyPair::generate(&mut rng), backend).with_dlog_bound(config.dlog_bound);
    let auditor = KeyPair::generate(&mut rng);

    let registry = Arc::new(MemoryRegistry::new());
    registry.register(alice, alice_wallet.public_key())?;
    registry.register(bob, bob_wallet.public_key())?;
    registry.register(carol, carol_wallet.public_key())?;

    let mut ledger = Ledger::new(Arc::new(MemoryStore::new()), registry, verifiers, auditor.public_key);
    ledger.track_asset(eur)?;
    ledger.track_asset(usd)?;

    // Opening balances are seeded before the ledger goes behind the service
    for (account, wallet, asset) in [(alice, &alice_wallet, eur), (bob, &bob_wallet, usd)] {
        let credit = public_credit(&mut rng, &wallet.public_key(), 1000);
        ledger.credit(&account, &asset, &credit.ciphertext, credit.pct)?;
    }
    let swap = config.swap_address;
    let service = SwapService::new(SwapEngine::new(ledger, Arc::new(SystemClock), swap));

    // Both parties let the swap contract settle their legs
    let balance = service.read_balance(alice, eur).await?;
    let nonce = service.get_allowance(alice, swap, eur).await?.nonce;
    let proof = alice_wallet.prove_public_approve(&balance, 500, nonce, eur)?;
    service.approve_public(alice, swap, eur, 500, proof).await?;

    let balance = service.read_balance(bob, usd).await?;
    let nonce = service.get_allowance(bob, swap, usd).await?.nonce;
    let proof = bob_wallet.prove_public_approve(&balance, 500, nonce, usd)?;
    service.approve_public(bob, swap, usd, 500, proof).await?;

    info!("📋 Offer scenario: alice sells EUR for USD at rate 3, bob buys 300");
    let id = service
        .initiate_offer(
            alice,
            OfferTerms {
                asset_buy: usd,
                asset_sell: eur,
                rate: 3 * Policy::PRECISION,
                max_amount_to_sell: 500,
                min_amount_to_sell: 0,
                expires_at: None,
                approval: Vec::new(),
            },
        )
        .await?;

    let offer = service.get_offer(id).await?;
    match bob_wallet.prove_acceptance(&mut rng, &offer, &alice_wallet.public_key(), 600) {
        Err(e) => info!("   Acceptance of 600 refused locally: {}", e),
        Ok(_) => warn!("   Acceptance of 600 unexpectedly proved"),
    }
    let proof = bob_wallet.prove_acceptance(&mut rng, &offer, &alice_wallet.public_key(), 300)?;
    service.accept_offer(bob, id, Vec::new(), proof).await?;

    let offer = service.get_offer(id).await?;
    let amount_to_buy = alice_wallet.read_amount_to_buy(&offer)?;
    let sell_amount = exact_sell_amount(amount_to_buy, offer.rate)
        .ok_or_else(|| SwapError::InvalidInput(format!("{} is not divisible at the offer rate", amount_to_buy)))?;
    let proof = alice_wallet.prove_finalization(&mut rng, &offer, &bob_wallet.public_key(), sell_amount)?;
    let instructions = TransferInstructions {
        sell_leg: TransferLeg::new(eur, sell_amount, public_credit(&mut rng, &bob_wallet.public_key(), sell_amount)),
        buy_leg: TransferLeg::new(usd, amount_to_buy, public_credit(&mut rng, &alice_wallet.public_key(), amount_to_buy)),
    };
    service.finalize_swap(alice, id, instructions.encode()?, proof).await?;

    if let Err(SwapError::OfferNotFound(_)) = service.get_offer(id).await {
        info!("   Offer {} settled and removed", id);
    }
    for (name, account, wallet) in [("alice", alice, &alice_wallet), ("bob", bob, &bob_wallet)] {
        let eur_balance = wallet.decrypt_balance(&service.read_balance(account, eur).await?)?;
        let usd_balance = wallet.decrypt_balance(&service.read_balance(account, usd).await?)?;
        info!("   {}: {} EUR, {} USD", name, eur_balance, usd_balance);
    }

    info!("📋 Allowance scenario: alice lets carol spend 500 EUR");
    let balance = service.read_balance(alice, eur).await?;
    let nonce = service.get_allowance(alice, carol, eur).await?.nonce;
    let proof = alice_wallet.prove_confidential_approve(
        &mut rng,
        &carol_wallet.public_key(),
        &auditor.public_key,
        &balance,
        500,
        nonce,
        eur,
    )?;
    service.approve_confidential(alice, carol, eur, proof).await?;

    let allowance = service.get_allowance(alice, carol, eur).await?;
    let proof = carol_wallet.prove_transfer_from(
        &mut rng,
        &allowance,
        &bob_wallet.public_key(),
        &auditor.public_key,
        200,
        eur,
    )?;
    service.spend_confidential(carol, alice, bob, eur, proof).await?;

    let allowance = service.get_allowance(alice, carol, eur).await?;
    info!("   Remaining allowance: {}", carol_wallet.decrypt(&allowance.encrypted_amount)?);
    match carol_wallet.prove_transfer_from(
        &mut rng,
        &allowance,
        &bob_wallet.public_key(),
        &auditor.public_key,
        400,
        eur,
    ) {
        Err(e) => info!("   Spend of 400 refused locally: {}", e),
        Ok(_) => warn!("   Spend of 400 unexpectedly proved"),
    }

    info!("🎉 Demo complete, {} events emitted", service.events().await.len());
    Ok(())
}

fn parse_address(label: &str, value: Option<String>) -> Result<Address> {
    let value = value.ok_or_else(|| SwapError::Config(format!("--{} is required", label)))?;
    Address::from_hex(&value).map_err(|e| SwapError::Config(format!("--{}: {}", label, e)))
}

fn inspect_state(
    data_dir: &Path,
    target: &str,
    id: Option<OfferId>,
    account: Option<String>,
    spender: Option<String>,
    asset: Option<String>,
) -> Result<()> {
    let store = SledStore::new(data_dir.join("state"))?;
    info!("🔍 Inspecting {:?}", data_dir);

    match target {
        "stats" => {
            let stats = store.stats()?;
            println!("Balances:   {}", stats.balances);
            println!("Allowances: {}", stats.allowances);
            println!("Offers:     {}", stats.offers);
            println!("On disk:    {} bytes", stats.size_on_disk);
        }
        "offers" => {
            for (_, bytes) in store.scan(Namespace::Offers)? {
                let offer: Offer = bincode::deserialize(&bytes)?;
                println!(
                    "#{} {} sells {} for {} (max {}, {:?})",
                    offer.id,
                    offer.initiator,
                    offer.asset_sell,
                    offer.asset_buy,
                    offer.max_amount_to_sell,
                    offer.state()
                );
            }
        }
        "offer" => {
            let id = id.ok_or_else(|| SwapError::Config("--id is required".to_string()))?;
            let offer = read_record::<Offer>(&store, Namespace::Offers, &offer_key(id))?
                .ok_or(SwapError::OfferNotFound(id))?;
            println!("{:#?}", offer);
        }
        "allowance" => {
            let owner = parse_address("account", account)?;
            let spender = parse_address("spender", spender)?;
            let asset = parse_address("asset", asset)?;
            let allowance =
                read_record::<EncryptedAllowance>(&store, Namespace::Allowances, &allowance_key(&owner, &spender, &asset))?
                    .unwrap_or_default();
            println!("{:#?}", allowance);
        }
        "balance" => {
            let account = parse_address("account", account)?;
            let asset = parse_address("asset", asset)?;
            let balance = read_record::<EncryptedBalance>(&store, Namespace::Balances, &balance_key(&account, &asset))?
                .unwrap_or_default();
            println!("nonce {}, index {}, {} amount PCTs", balance.nonce, balance.transaction_index, balance.amount_pcts.len());
            println!("{:?}", balance.egct);
        }
        other => {
            return Err(SwapError::Config(format!(
                "unknown target {}; use stats, offers, offer, allowance, balance",
                other
            )));
        }
    }
    Ok(())
}

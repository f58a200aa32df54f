use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::application::{PortalConfig, PortalService};
use crate::domain::{
    format_cents, format_percentage, parse_cents, parse_percentage, Broker, CommissionStatus,
    WithdrawalStatus, DEFAULT_BROKER_CODE_PREFIX,
};
use crate::http::{self, ServerConfig};

/// Corretora - broker portal backend
#[derive(Parser)]
#[command(name = "corretora")]
#[command(about = "Broker portal: accounts, commissions, withdrawals and listings")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "CORRETORA_DB", default_value = "corretora.db")]
    pub database: String,

    /// Prefix for sequential broker codes
    #[arg(long, env = "CORRETORA_CODE_PREFIX", default_value = DEFAULT_BROKER_CODE_PREFIX)]
    pub code_prefix: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP portal
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        /// Return verification codes in API responses (debug builds only)
        #[arg(long)]
        echo_codes: bool,
    },

    /// Broker directory commands
    #[command(subcommand)]
    Broker(BrokerCommands),

    /// Commission commands
    #[command(subcommand)]
    Commission(CommissionCommands),

    /// Withdrawal commands
    #[command(subcommand)]
    Withdrawal(WithdrawalCommands),

    /// Verify stored balances against commissions and withdrawals
    Check,
}

#[derive(Subcommand)]
pub enum BrokerCommands {
    /// List all brokers
    List,

    /// Show a broker with balances and ledger history
    Show {
        /// Broker ID or email
        broker: String,
    },
}

#[derive(Subcommand)]
pub enum CommissionCommands {
    /// Record a commission for a sale
    Record {
        /// Broker ID or email
        #[arg(long)]
        broker: String,

        /// Sale amount (e.g., "1000.00")
        #[arg(long)]
        sale: String,

        /// Commission percentage (e.g., "5" or "2.5%")
        #[arg(long)]
        percentage: String,

        /// Credit the available balance instead of pending
        #[arg(long)]
        available: bool,
    },

    /// Move a pending commission to the available balance
    Release {
        /// Commission ID
        id: String,
    },

    /// List a broker's commissions
    List {
        /// Broker ID or email
        #[arg(long)]
        broker: String,
    },
}

#[derive(Subcommand)]
pub enum WithdrawalCommands {
    /// List withdrawals
    List {
        /// Filter by broker ID or email
        #[arg(long)]
        broker: Option<String>,
    },

    /// Approve a pending withdrawal
    Approve {
        /// Withdrawal ID
        id: String,
    },

    /// Mark an approved withdrawal as paid
    Pay {
        /// Withdrawal ID
        id: String,
    },
}

impl Cli {
    fn portal_config(&self) -> PortalConfig {
        PortalConfig::default().with_prefix(self.code_prefix.clone())
    }

    async fn connect(&self) -> Result<PortalService> {
        PortalService::connect(&self.database, self.portal_config())
            .await
            .with_context(|| format!("Failed to open database {}", self.database))
    }

    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);

        match &self.command {
            Commands::Init => {
                PortalService::init(&self.database, self.portal_config()).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Serve { bind, echo_codes } => {
                // Serving a fresh file is allowed; migrations are idempotent.
                let service = PortalService::init(&self.database, self.portal_config()).await?;
                let config = ServerConfig {
                    bind: *bind,
                    echo_codes: *echo_codes,
                };
                http::serve(service, config).await?;
            }

            Commands::Broker(cmd) => {
                let service = self.connect().await?;
                run_broker_command(&service, cmd).await?;
            }

            Commands::Commission(cmd) => {
                let service = self.connect().await?;
                run_commission_command(&service, cmd).await?;
            }

            Commands::Withdrawal(cmd) => {
                let service = self.connect().await?;
                run_withdrawal_command(&service, cmd).await?;
            }

            Commands::Check => {
                let service = self.connect().await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve a broker by UUID or, failing that, by email.
async fn resolve_broker(service: &PortalService, key: &str) -> Result<Broker> {
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(service.get_broker(id).await?);
    }
    service
        .find_broker_by_email(key)
        .await?
        .with_context(|| format!("Broker not found: {}", key))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid {} ID format (expected UUID)", what))
}

async fn run_broker_command(service: &PortalService, cmd: &BrokerCommands) -> Result<()> {
    match cmd {
        BrokerCommands::List => {
            let brokers = service.list_brokers().await?;
            if brokers.is_empty() {
                println!("No brokers found.");
            } else {
                println!(
                    "{:<13} {:<24} {:<28} {:>12} {:>12}",
                    "CODE", "NAME", "EMAIL", "AVAILABLE", "PENDING"
                );
                println!("{}", "-".repeat(93));
                for broker in brokers {
                    println!(
                        "{:<13} {:<24} {:<28} {:>12} {:>12}",
                        broker.broker_code.as_deref().unwrap_or("-"),
                        truncate(&broker.name, 24),
                        truncate(&broker.email, 28),
                        format_cents(broker.available_balance_cents),
                        format_cents(broker.pending_balance_cents)
                    );
                }
            }
        }

        BrokerCommands::Show { broker } => {
            let broker = resolve_broker(service, broker).await?;
            let statement = service.broker_statement(broker.id).await?;
            let broker = &statement.broker;

            println!("Broker: {}", broker.name);
            println!("  ID:        {}", broker.id);
            println!("  Code:      {}", broker.broker_code.as_deref().unwrap_or("-"));
            println!("  Email:     {}", broker.email);
            if !broker.phone.is_empty() {
                println!("  Phone:     {}", broker.phone);
            }
            if let Some(creci) = &broker.creci {
                println!("  CRECI:     {}", creci);
            }
            println!(
                "  Verified:  email {}, phone {}",
                yes_no(broker.email_verified),
                yes_no(broker.phone_verified)
            );
            println!("  Password:  {}", if broker.has_password() { "set" } else { "not set" });
            if let Some(bank) = &broker.bank_details {
                println!("  PIX key:   {}", bank.pix_key);
            }
            println!(
                "  Created:   {}",
                broker.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Available: {}", format_cents(broker.available_balance_cents));
            println!("  Pending:   {}", format_cents(broker.pending_balance_cents));
            if !statement.is_consistent() {
                println!(
                    "  WARNING: records imply available {} / pending {}",
                    format_cents(statement.expected.available),
                    format_cents(statement.expected.pending)
                );
            }

            println!();
            println!(
                "  Commissions: {}, withdrawals: {}",
                statement.commissions.len(),
                statement.withdrawals.len()
            );
        }
    }
    Ok(())
}

async fn run_commission_command(service: &PortalService, cmd: &CommissionCommands) -> Result<()> {
    match cmd {
        CommissionCommands::Record {
            broker,
            sale,
            percentage,
            available,
        } => {
            let broker = resolve_broker(service, broker).await?;
            let sale_cents =
                parse_cents(sale).context("Invalid sale amount. Use '1000.00' or '1000'")?;
            let bps = parse_percentage(percentage).context("Invalid percentage. Use '5' or '2.5%'")?;
            let status = if *available {
                CommissionStatus::Available
            } else {
                CommissionStatus::Pending
            };

            let commission = service
                .record_commission(broker.id, sale_cents, bps, status)
                .await?;
            println!(
                "Recorded commission: {} ({} of {}) for {} [{}]",
                format_cents(commission.commission_cents),
                format_percentage(commission.percentage_bps),
                format_cents(commission.sale_amount_cents),
                broker.name,
                commission.status
            );
            println!("  ID: {}", commission.id);
        }

        CommissionCommands::Release { id } => {
            let id = parse_id(id, "commission")?;
            let commission = service.release_commission(id).await?;
            println!(
                "Released commission {}: {} now available",
                commission.id,
                format_cents(commission.commission_cents)
            );
        }

        CommissionCommands::List { broker } => {
            let broker = resolve_broker(service, broker).await?;
            let commissions = service.list_commissions(broker.id).await?;
            if commissions.is_empty() {
                println!("No commissions found.");
            } else {
                println!(
                    "{:<12} {:>14} {:>8} {:>12} {:<10} ID",
                    "DATE", "SALE", "PCT", "COMMISSION", "STATUS"
                );
                println!("{}", "-".repeat(95));
                for c in commissions {
                    println!(
                        "{:<12} {:>14} {:>8} {:>12} {:<10} {}",
                        c.created_at.format("%Y-%m-%d"),
                        format_cents(c.sale_amount_cents),
                        format_percentage(c.percentage_bps),
                        format_cents(c.commission_cents),
                        c.status,
                        c.id
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_withdrawal_command(service: &PortalService, cmd: &WithdrawalCommands) -> Result<()> {
    match cmd {
        WithdrawalCommands::List { broker } => {
            let broker_id = match broker {
                Some(key) => Some(resolve_broker(service, key).await?.id),
                None => None,
            };
            let withdrawals = service.list_withdrawals(broker_id).await?;
            if withdrawals.is_empty() {
                println!("No withdrawals found.");
            } else {
                println!(
                    "{:<12} {:>12} {:<10} {:<24} ID",
                    "DATE", "AMOUNT", "STATUS", "DESTINATION"
                );
                println!("{}", "-".repeat(96));
                for w in withdrawals {
                    println!(
                        "{:<12} {:>12} {:<10} {:<24} {}",
                        w.created_at.format("%Y-%m-%d"),
                        format_cents(w.amount_cents),
                        w.status,
                        truncate(&w.destination_key, 24),
                        w.id
                    );
                }
            }
        }

        WithdrawalCommands::Approve { id } => {
            let id = parse_id(id, "withdrawal")?;
            let withdrawal = service.advance_withdrawal(id, WithdrawalStatus::Approved).await?;
            println!(
                "Approved withdrawal {}: {}",
                withdrawal.id,
                format_cents(withdrawal.amount_cents)
            );
        }

        WithdrawalCommands::Pay { id } => {
            let id = parse_id(id, "withdrawal")?;
            let withdrawal = service.advance_withdrawal(id, WithdrawalStatus::Paid).await?;
            println!(
                "Paid withdrawal {}: {} -> {}",
                withdrawal.id,
                format_cents(withdrawal.amount_cents),
                withdrawal.destination_key
            );
        }
    }
    Ok(())
}

async fn run_check_command(service: &PortalService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Brokers:     {}", report.broker_count);
    println!("Commissions: {}", report.commission_count);
    println!("Withdrawals: {}", report.withdrawal_count);
    println!();

    if report.is_ok() {
        println!("Ledger is consistent.");
        return Ok(());
    }

    println!("Issues found:");
    for id in &report.negative_balances {
        println!("  - Broker {} has a negative balance", id);
    }
    for m in &report.mismatches {
        println!(
            "  - Broker {}: stored {} / {}, expected {} / {} (available / pending)",
            m.broker_id,
            format_cents(m.stored.available),
            format_cents(m.stored.pending),
            format_cents(m.expected.available),
            format_cents(m.expected.pending)
        );
    }
    for code in &report.duplicate_codes {
        println!("  - Broker code {} is assigned more than once", code);
    }
    if report.orphan_records > 0 {
        println!(
            "  - {} record(s) reference a missing broker",
            report.orphan_records
        );
    }
    anyhow::bail!("Ledger integrity check failed");
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

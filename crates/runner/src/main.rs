use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use connector_core::Gateway;
use connector_sim::{SimAccount, SimConfig, SimulatedGateway};
use gateway_client::{ClientConfig, ClientError, GatewayClient, PositionUpdate};
use model::{OrderAction, PositionRow};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

const USAGE: &str = "usage: runner funds | order <SYMBOL> <BUY|SELL> <QTY> | positions";

enum Command {
    Funds,
    Order {
        symbol: String,
        action: OrderAction,
        quantity: Decimal,
    },
    Positions,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    match args {
        [cmd] if cmd == "funds" => Ok(Command::Funds),
        [cmd] if cmd == "positions" => Ok(Command::Positions),
        [cmd, symbol, action, quantity] if cmd == "order" => {
            let action = OrderAction::from_str(action).map_err(|e| e.to_string())?;
            let quantity = Decimal::from_str(quantity)
                .map_err(|e| format!("invalid quantity '{}': {}", quantity, e))?;
            Ok(Command::Order {
                symbol: symbol.clone(),
                action,
                quantity,
            })
        }
        _ => Err(USAGE.to_string()),
    }
}

/// Gateway used for dry runs: one paper account and two open positions.
fn dry_run_gateway() -> SimulatedGateway {
    let position = |symbol: &str, security_type: &str, qty: i64, cost: Decimal| PositionRow {
        account: "DU0000001".to_string(),
        symbol: symbol.to_string(),
        security_type: security_type.to_string(),
        currency: Some("USD".to_string()),
        position: Decimal::from(qty),
        average_cost: cost,
    };

    SimulatedGateway::new(SimConfig {
        accounts: vec![SimAccount::new("DU0000001", Decimal::new(10_000_000, 2))],
        positions: vec![
            position("AAPL", "STK", 100, Decimal::new(18_250, 2)),
            position("EUR", "CASH", 25_000, Decimal::new(10_845, 5)),
        ],
        ..Default::default()
    })
}

async fn execute(client: &GatewayClient, command: Command) -> Result<(), ClientError> {
    match command {
        Command::Funds => {
            let snapshot = client.get_available_funds().await?;
            println!(
                "{} | available funds: {} {}",
                snapshot.account, snapshot.available_funds, snapshot.currency
            );
        }
        Command::Order {
            symbol,
            action,
            quantity,
        } => {
            let accepted = client.place_order(&symbol, action, quantity).await?;
            println!(
                "order {} | {} {} {} ({}) on {} | next valid id: {}",
                accepted.order_id,
                accepted.intent.action,
                accepted.intent.quantity,
                accepted.instrument.symbol,
                accepted.instrument.security_type.as_gateway_str(),
                accepted.instrument.venue,
                accepted.next_valid_id
            );
        }
        Command::Positions => {
            let mut stream = client.position_stream()?;
            while let Some(update) = stream.recv().await {
                match update {
                    PositionUpdate::Row(row) => println!(
                        "{} | {} ({}) | position: {} | avg cost: {}",
                        row.account, row.symbol, row.security_type, row.position, row.average_cost
                    ),
                    PositionUpdate::End => break,
                }
            }
            client.cancel_positions()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    common::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = ClientConfig::from_env();
    info!(
        endpoint = %config.connector.endpoint(),
        environment = %config.connector.environment,
        "Starting dry run against simulated gateway"
    );
    if config.connector.environment.is_live() {
        warn!("Live environment configured; orders still go to the simulated gateway");
    }

    let gateway: Arc<dyn Gateway> = Arc::new(dry_run_gateway());
    let client = match GatewayClient::connect(gateway, config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to connect");
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::select! {
        result = execute(&client, command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating shutdown");
            Ok(())
        }
    };

    client.shutdown();
    println!("\n{}", client.metrics());

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

use clap::{Args, Parser, Subcommand};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::env;

/// Staff side of the shared tab
#[derive(Parser, Debug)]
#[command(name = "table-tab")]
#[command(about = "client cli used by restaurant staffs to interact with the server", version, long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// list tables of an establishment
    #[command(arg_required_else_help = true)]
    Tables {
        #[arg(short = 'e', help = "Establishment id")]
        establishment_id: i64,
    },
    /// bill related ops
    #[command(arg_required_else_help = true)]
    Bill(BillArgs),
}

#[derive(Debug, Args)]
struct BillArgs {
    #[command(subcommand)]
    command: BillCmds,
}

#[derive(Debug, Subcommand)]
enum BillCmds {
    /// open a bill on a table for a customer
    #[command(arg_required_else_help = true)]
    Open {
        #[arg(long, help = "Establishment id")]
        establishment: i64,
        #[arg(long, help = "Table id")]
        table: i64,
        #[arg(long, help = "Customer owning the bill")]
        customer: i64,
    },
    #[command(arg_required_else_help = true)]
    Show {
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        bid: i64,
    },
    #[command(arg_required_else_help = true)]
    Order(OrderArgs),
    #[command(arg_required_else_help = true)]
    Payment(PaymentArgs),
    /// take the remainder offline and close the bill
    #[command(arg_required_else_help = true)]
    Close {
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        bid: i64,
        #[arg(long, help = "Value received, defaults to what is still to pay")]
        value: Option<String>,
    },
}

#[derive(Debug, Args)]
struct OrderArgs {
    #[arg(short = 'b', help = "Bill id to operate", value_parser = clap::value_parser!(i64).range(1..))]
    bid: i64,
    #[arg(short = 'o', help = "Order id", value_parser = clap::value_parser!(i64).range(1..))]
    oid: i64,
    #[command(subcommand)]
    command: OrderCmds,
}

#[derive(Debug, Subcommand)]
enum OrderCmds {
    Accept,
    Finish,
    Reject,
}

#[derive(Debug, Args)]
struct PaymentArgs {
    #[arg(short = 'b', help = "Bill id to operate", value_parser = clap::value_parser!(i64).range(1..))]
    bid: i64,
    #[arg(short = 'p', help = "Payment uuid")]
    uuid: String,
    #[command(subcommand)]
    command: PaymentCmds,
}

#[derive(Debug, Subcommand)]
enum PaymentCmds {
    Approve,
    Reject,
}

const DEFAULT_HOST: &str = "http://localhost:8080";

async fn report(res: Response, ok_msg: &str) -> Result<(), anyhow::Error> {
    match res.status() {
        StatusCode::OK | StatusCode::CREATED => {
            let body = res.json::<Value>().await?;
            println!("{}", ok_msg);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        StatusCode::BAD_REQUEST => {
            println!("Bad request");
        }
        StatusCode::NOT_FOUND => {
            println!("Resource not found");
        }
        StatusCode::CONFLICT | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
            println!("Refused: {}", res.text().await?);
        }
        unexpected => {
            println!("got unexpected status code, {}", unexpected);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();
    let host = env::var("HOST").unwrap_or(DEFAULT_HOST.to_string());
    let client = Client::new();

    match args.command {
        Commands::Tables { establishment_id } => {
            let res = client
                .get(format!("{}/v1/tables", host))
                .query(&[("establishment_id", establishment_id)])
                .send()
                .await?;
            report(res, &format!("tables of establishment={}", establishment_id)).await?;
        }
        Commands::Bill(bill) => match bill.command {
            BillCmds::Open {
                establishment,
                table,
                customer,
            } => {
                println!("opening a bill on table={} for customer={}", table, customer);
                let res = client
                    .post(format!("{}/v1/bills", host))
                    .json(&serde_json::json!({
                        "establishment_id": establishment,
                        "table_id": table,
                        "customer_id": customer,
                    }))
                    .send()
                    .await?;
                report(res, "bill opened").await?;
            }
            BillCmds::Show { bid } => {
                let res = client.get(format!("{}/v1/bill/{}", host, bid)).send().await?;
                report(res, &format!("bill={}", bid)).await?;
            }
            BillCmds::Order(args) => {
                let action = match args.command {
                    OrderCmds::Accept => "accept",
                    OrderCmds::Finish => "finish",
                    OrderCmds::Reject => "reject",
                };
                let res = client
                    .patch(format!("{}/v1/bill/{}/order/{}", host, args.bid, args.oid))
                    .json(&serde_json::json!({ "action": action }))
                    .send()
                    .await?;
                report(res, &format!("order={} {}ed", args.oid, action)).await?;
            }
            BillCmds::Payment(args) => {
                let action = match args.command {
                    PaymentCmds::Approve => "approve",
                    PaymentCmds::Reject => "reject",
                };
                let res = client
                    .post(format!("{}/v1/bill/{}/payment/{}/{}", host, args.bid, args.uuid, action))
                    .send()
                    .await?;
                report(res, &format!("payment={} {}d", args.uuid, action)).await?;
            }
            BillCmds::Close { bid, value } => {
                let res = client
                    .post(format!("{}/v1/bill/{}/payments/close", host, bid))
                    .json(&serde_json::json!({ "value": value }))
                    .send()
                    .await?;
                report(res, &format!("bill={} closed", bid)).await?;
            }
        },
    };
    Ok(())
}

//! Awaitable user prompts
//!
//! Flow steps ask the user through [`Prompt`] and receive typed decisions.
//! The terminal implementation reads answers from stdin.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use folioflow_core::PaymentRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAction {
    Pay,
    CheckStatus,
    Cancel,
}

#[async_trait]
pub trait Prompt: Send {
    async fn confirm(&mut self, message: &str) -> Decision;

    /// Present an open payment request and wait for the user's next action.
    async fn payment_action(&mut self, request: &PaymentRequest) -> PaymentAction;

    /// Show a status line without waiting for input
    fn notify(&mut self, message: &str);
}

/// Lovelace as ADA with six decimal places
pub fn lovelace_to_ada(lovelace: u64) -> Decimal {
    Decimal::from_i128_with_scale(lovelace as i128, 6).normalize()
}

/// Line-oriented console on stdin/stdout.
///
/// The REPL reads its commands from the same reader, so answers and commands
/// never race for input.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next input line, or `None` at end of input
    pub async fn read_line(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }
}

pub fn parse_decision(answer: &str) -> Decision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "p" | "premium" => Decision::Proceed,
        _ => Decision::Cancel,
    }
}

pub fn parse_payment_action(answer: &str) -> Option<PaymentAction> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "p" | "pay" => Some(PaymentAction::Pay),
        "c" | "check" | "status" => Some(PaymentAction::CheckStatus),
        "x" | "cancel" | "q" => Some(PaymentAction::Cancel),
        _ => None,
    }
}

#[async_trait]
impl Prompt for Console {
    async fn confirm(&mut self, message: &str) -> Decision {
        println!("{} [y/N]", message);
        match self.read_line().await {
            Some(answer) => parse_decision(&answer),
            None => Decision::Cancel,
        }
    }

    async fn payment_action(&mut self, request: &PaymentRequest) -> PaymentAction {
        println!();
        println!("  Premium analysis payment");
        println!("  Amount:       {} ADA", lovelace_to_ada(request.amount));
        println!("  Identifier:   {}", request.blockchain_identifier);
        println!("  Pay by:       {}", request.deadline().format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  [p]ay  [c]heck status  [x] cancel");

        loop {
            let Some(answer) = self.read_line().await else {
                return PaymentAction::Cancel;
            };
            match parse_payment_action(&answer) {
                Some(action) => return action,
                None => println!("  Please answer p, c or x"),
            }
        }
    }

    fn notify(&mut self, message: &str) {
        println!("  {}", message);
    }
}

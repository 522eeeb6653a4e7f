use loan_orchestrator::{
    config::AppConfig, telemetry, ChatReply, Orchestrator, Step, StepOutcome, StepRequest,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    telemetry::init(&config.log_level)?;

    let orchestrator = Orchestrator::from_config(&config)?;
    let session_id = orchestrator.create_session().await;
    info!(session_id = %session_id, "Terminal chat started");

    println!("=== LOAN ASSISTANT ===");
    println!("Type your message, or 'quit' to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("quit") || text.eq_ignore_ascii_case("exit") {
            break;
        }

        let reply = match orchestrator.handle_message(&session_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };
        println!("Bot: {}", reply.response_text);

        if let Some(request) = step_request(&reply) {
            match orchestrator.execute_step(&session_id, request).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    }

    Ok(())
}

/// Turn a directive reply into the step the chat client would call.
fn step_request(reply: &ChatReply) -> Option<StepRequest> {
    let arguments = reply.arguments.as_ref()?;
    match reply.directive? {
        Step::VerifyKyc => Some(StepRequest::VerifyKyc {
            customer_id: arguments.customer_id.clone()?,
        }),
        Step::Underwrite => Some(StepRequest::Underwrite {
            loan_amount: arguments.loan_amount?,
        }),
    }
}

fn print_outcome(outcome: &StepOutcome) {
    match outcome {
        StepOutcome::Kyc(result) => match (&result.profile, &result.message) {
            (Some(profile), _) => println!(
                "Bot: KYC verified for {}. How much loan amount would you like to apply for?",
                profile.name
            ),
            (None, Some(message)) => println!("Bot: {}", message),
            (None, None) => println!("Bot: KYC verification failed."),
        },
        StepOutcome::Underwrite(result) => {
            println!("Bot: {}", result.message);
            if let Some(summary) = &result.notification_summary {
                println!("Bot: {}", summary);
            }
        }
    }
}

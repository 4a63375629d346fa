//! Plain-text report rendering

use escrow_audit_orchestrator::AuditReport;
use escrow_audit_types::AuditResult;

pub fn render(report: &AuditReport) {
    let passes = [("primary", &report.primary), ("reverse", &report.reverse)];
    for (label, results) in passes {
        if results.is_empty() {
            continue;
        }
        println!();
        println!("{label} pass");
        println!("{}", "-".repeat(72));
        for result in results {
            render_result(result);
        }
    }

    println!();
    println!("overall: {}", report.worst_status());
}

fn render_result(result: &AuditResult) {
    println!(
        "[{:>11}] {} holds {} of {}",
        result.status.to_string(),
        result.escrow_address,
        result.escrow_balance,
        result.denom
    );
    match &result.counterparty_supply {
        Some(supply) => {
            println!("              counterparty supply {supply}, discrepancy {}", result.discrepancy)
        }
        None => println!("              counterparty supply unavailable"),
    }
    if let (Some(origin), Some(base)) = (&result.origin_chain, &result.base_denom) {
        println!("              origin {origin} ({base})");
    }
    for hop in &result.hops {
        println!("              via {} {}/{}", hop.chain, hop.port, hop.channel);
    }
    for error in &result.errors {
        println!("              error: {error}");
    }
}

//! `laneguard submit`: upload, wait, show results.

use laneguard_client::timeline::TimelineSync;

use super::{job, results, Context};
use crate::cli::SubmitArgs;

pub async fn run(ctx: &Context, args: SubmitArgs) -> anyhow::Result<()> {
    let params = args.analyze_params().validated()?;
    let job_id = ctx.api.submit_job(&args.file, &params).await?;
    println!("Job {job_id} submitted");

    if args.no_wait {
        return Ok(());
    }

    let cancel = super::interrupt_token();
    let Some(hand_off) = job::follow(ctx, job_id, &cancel).await? else {
        return Ok(());
    };

    let sync = TimelineSync::new(std::sync::Arc::new(ctx.api.clone()));
    let loaded = sync.load(&hand_off.result_id).await?;
    println!();
    results::print_timeline(&loaded);
    Ok(())
}

use super::Context;

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    let ok = ctx.api.health().await?;
    if ok {
        println!("{} is up", ctx.config.api_url);
        Ok(())
    } else {
        anyhow::bail!("{} answered but did not report ok", ctx.config.api_url)
    }
}

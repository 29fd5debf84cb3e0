//! `papersift set-endpoint` - remember the completion endpoint

use anyhow::Result;
use clap::Args;

use crate::config::{AppContext, SavedEndpoint, mask_key};

#[derive(Args, Debug)]
pub struct SetEndpointArgs {
    /// Base URL of an OpenAI-compatible API (e.g. https://api.openai.com/v1)
    pub url: String,
    /// API key; may be `${VAR}` to read it from the environment at run time
    pub key: String,
}

pub fn run(args: SetEndpointArgs, ctx: &AppContext) -> Result<()> {
    ctx.save_endpoint(&SavedEndpoint {
        url: args.url.clone(),
        key: args.key.clone(),
    })?;
    eprintln!("Endpoint set to {} (key {})", args.url, mask_key(&args.key));
    Ok(())
}

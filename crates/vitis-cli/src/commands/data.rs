use anyhow::{Result, bail};
use colored::Colorize;
use vitis_cache::{
    AppConfig, EnrichedPayload, OriginClient, RequestParams, Retrieval, RetrievalPipeline,
};

use crate::cli::{GetArgs, OutputFormat};
use crate::output::{print_error, print_json, print_table};

pub async fn get(
    pipeline: &RetrievalPipeline,
    config: &AppConfig,
    args: &GetArgs,
    format: OutputFormat,
) -> Result<()> {
    let origin = OriginClient::new(&config.origin)?;
    let params = RequestParams::new()
        .with_opt(RequestParams::YEAR, args.year.as_deref())
        .with_opt(RequestParams::SUB_OPTION, args.sub_option.as_deref());

    let retrieval = pipeline
        .retrieve(&args.endpoint, &params, || origin.fetch(&args.endpoint, &params))
        .await;

    match retrieval {
        Retrieval::Found { payload, .. } => match format {
            OutputFormat::Json => print_json(&serde_json::to_value(&payload)?),
            OutputFormat::Table => {
                print_payload(&payload);
                Ok(())
            }
        },
        Retrieval::Unavailable { failures } => {
            for failure in &failures {
                print_error(&format!(
                    "{} [{}]: {}",
                    failure.stage.as_str(),
                    failure.error_class,
                    failure.message
                ));
            }
            bail!("no cache layer could serve '{}'", args.endpoint)
        }
    }
}

fn print_payload(payload: &EnrichedPayload) {
    let header: Vec<&str> = payload
        .data
        .header
        .first()
        .map(|row| row.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let body = payload.data.body.iter().flat_map(|item| {
        std::iter::once(item.item_data.clone()).chain(
            item.sub_items
                .iter()
                .map(|sub| sub.iter().map(|cell| format!("  {cell}")).collect::<Vec<String>>()),
        )
    });
    let footer = payload
        .data
        .footer
        .iter()
        .map(|row| row.iter().map(|cell| cell.bold().to_string()).collect::<Vec<String>>());
    print_table(&header, body.chain(footer));

    println!(
        "{}: {} ({})",
        "Source".cyan(),
        payload.metadata.cache_status.active_layer,
        payload.metadata.cache_status.layer_description
    );
    println!("{}: {}", "Year".cyan(), payload.metadata.year);
    println!("{}: {}", "Expires in".cyan(), payload.expires_in);
}

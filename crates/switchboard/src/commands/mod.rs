use async_trait::async_trait;
use eyre::Result;

pub mod config;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

pub mod google;
pub mod signup;

use anyhow::Result;

#[derive(Debug)]
pub enum Action {
    Signup(signup::Args),
    Google(google::Args),
}

impl Action {
    /// # Errors
    ///
    /// Returns an error if the selected action fails.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Signup(args) => signup::execute(args).await,
            Self::Google(args) => google::execute(args).await,
        }
    }
}

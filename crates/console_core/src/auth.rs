use shared::{
    domain::UserInfo,
    error::{Failure, FailureKind},
    protocol::{LoginRequest, LoginResponse},
};
use tracing::{info, warn};

use crate::pipeline::{PipelineError, RequestOptions, RequestPipeline, RequestResult};

const LOGIN_PATH: &str = "/api/auth/login";
const CURRENT_USER_PATH: &str = "/api/auth/me";

impl RequestPipeline {
    /// Signs in and stores the returned bearer token on success.
    ///
    /// A success envelope without a usable token is reported as malformed and
    /// leaves the current session as it was.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RequestResult<LoginResponse>, PipelineError> {
        let result: RequestResult<LoginResponse> = self
            .post(
                LOGIN_PATH,
                &LoginRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                RequestOptions::default(),
            )
            .await?;

        if !result.success {
            return Ok(result);
        }
        match result.data.as_ref() {
            Some(login) if !login.token.trim().is_empty() => {
                self.session().establish(&login.token)?;
                info!(username = %login.username, "auth: signed in");
                Ok(result)
            }
            _ => {
                warn!("auth: login succeeded without a token");
                let rejected = RequestResult::failed(
                    Failure::new(
                        FailureKind::Malformed,
                        FailureKind::Malformed.default_message(),
                    ),
                    None,
                );
                self.announce(&rejected, &RequestOptions::default());
                Ok(rejected)
            }
        }
    }

    pub async fn current_user(&self) -> Result<RequestResult<UserInfo>, PipelineError> {
        self.get(CURRENT_USER_PATH, &(), RequestOptions::default())
            .await
    }

    /// Local sign-out; the backend keeps no session state to revoke.
    pub fn logout(&self) -> bool {
        let had_token = self.session().teardown();
        info!(had_token, "auth: signed out");
        had_token
    }
}

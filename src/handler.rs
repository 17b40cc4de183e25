use assume_role_schema::credentials::TemporaryCredentials;

pub mod export;
pub mod shell;

pub struct HandleCredentialsRequest<'a> {
    pub region_name: Option<&'a str>,
    pub credentials: &'a TemporaryCredentials,
}

/// What to do with freshly obtained credentials.
pub trait HandleCredentials {
    fn handle_credentials(self, request: HandleCredentialsRequest) -> anyhow::Result<()>;
}

struct Variable<'a> {
    name: &'a str,
    value: Option<String>,
}

fn into_variables(request: HandleCredentialsRequest) -> Vec<Variable> {
    fn v<S: Into<String>>(name: &str, value: Option<S>) -> Variable {
        Variable {
            name,
            value: value.map(|s| s.into()),
        }
    }

    let credentials = request.credentials;
    let mut variables = vec![
        // a profile would take precedence over the exported keys in some SDKs
        v("AWS_PROFILE", Option::<String>::None),
        v("AWS_ACCESS_KEY_ID", Some(credentials.access_key_id())),
        v("AWS_SECRET_ACCESS_KEY", Some(credentials.secret_access_key())),
        v("AWS_SESSION_TOKEN", Some(credentials.session_token())),
        v(
            "AWS_SESSION_EXPIRATION",
            Some(credentials.expires().to_rfc3339()),
        ),
    ];

    if let Some(region_name) = request.region_name {
        variables.push(v("AWS_REGION", Some(region_name)));
        variables.push(v("AWS_DEFAULT_REGION", Some(region_name)));
    }

    variables
}

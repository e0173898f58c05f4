//! Remote content readers for catalogloader.
//!
//! - [`readers`]: URL readers for GitHub, GitLab, Bitbucket, Azure DevOps,
//!   and plain HTTP, plus the host-keyed [`UrlReaders`] registry
//! - [`ldap`]: the directory-service organisation reader
//! - [`http`]: the shared HTTP client and response classification

pub mod http;
pub mod ldap;
pub mod readers;

pub use http::build_client;
pub use ldap::{
    DirectoryClient, DirectoryConnector, DirectoryEntry, LdapClient, LdapConnector, LdapOrg,
    read_ldap_org, read_ldap_org_from,
};
pub use readers::{
    AzureUrlReader, BitbucketUrlReader, FetchUrlReader, GithubUrlReader, GitlabUrlReader,
    RepoFile, UrlReader, UrlReaders,
};

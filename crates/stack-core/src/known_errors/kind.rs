//! Known error kinds, their hierarchy and the code registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use thiserror::Error;

/// Declares the closed set of known error kinds.
///
/// Each entry is `Kind[: Parent] => code`, where `code` is `Some("WIRE_CODE")`
/// for concrete (leaf) kinds and `None` for abstract kinds that only exist
/// for matching.
macro_rules! known_error_kinds {
    ($( $kind:ident $(: $parent:ident)? => $code:expr ),* $(,)?) => {
        /// Every kind of known error, concrete and abstract.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum KnownErrorKind {
            $($kind,)*
        }

        impl KnownErrorKind {
            /// All declared kinds, in declaration order.
            pub const ALL: &'static [KnownErrorKind] = &[$(KnownErrorKind::$kind,)*];

            /// The declaration of this kind.
            pub const fn declaration(self) -> KindDeclaration {
                match self {
                    $(KnownErrorKind::$kind => KindDeclaration {
                        kind: KnownErrorKind::$kind,
                        name: stringify!($kind),
                        code: $code,
                        parent: known_error_kinds!(@parent $($parent)?),
                    },)*
                }
            }
        }
    };
    (@parent) => { None };
    (@parent $parent:ident) => { Some(KnownErrorKind::$parent) };
}

known_error_kinds! {
    KnownError => None,

    UnsupportedError: KnownError => Some("UNSUPPORTED_ERROR"),
    BodyParsingError: KnownError => Some("BODY_PARSING_ERROR"),
    SchemaError: KnownError => Some("SCHEMA_ERROR"),
    AllOverloadsFailed: KnownError => Some("ALL_OVERLOADS_FAILED"),

    ProjectAuthenticationError: KnownError => None,
    InvalidProjectAuthentication: ProjectAuthenticationError => None,
    ProjectKeyWithoutAccessType: InvalidProjectAuthentication => Some("PROJECT_KEY_WITHOUT_ACCESS_TYPE"),
    InvalidAccessType: InvalidProjectAuthentication => Some("INVALID_ACCESS_TYPE"),
    AccessTypeWithoutProjectId: InvalidProjectAuthentication => Some("ACCESS_TYPE_WITHOUT_PROJECT_ID"),
    AccessTypeRequired: InvalidProjectAuthentication => Some("ACCESS_TYPE_REQUIRED"),
    InsufficientAccessType: InvalidProjectAuthentication => Some("INSUFFICIENT_ACCESS_TYPE"),
    InvalidPublishableClientKey: InvalidProjectAuthentication => Some("INVALID_PUBLISHABLE_CLIENT_KEY"),
    InvalidSecretServerKey: InvalidProjectAuthentication => Some("INVALID_SECRET_SERVER_KEY"),
    InvalidSuperSecretAdminKey: InvalidProjectAuthentication => Some("INVALID_SUPER_SECRET_ADMIN_KEY"),
    InvalidAdminAccessToken: InvalidProjectAuthentication => None,
    UnparsableAdminAccessToken: InvalidAdminAccessToken => Some("UNPARSABLE_ADMIN_ACCESS_TOKEN"),
    AdminAccessTokenExpired: InvalidAdminAccessToken => Some("ADMIN_ACCESS_TOKEN_EXPIRED"),
    InvalidProjectForAdminAccessToken: InvalidAdminAccessToken => Some("INVALID_PROJECT_FOR_ADMIN_ACCESS_TOKEN"),
    AdminAccessTokenIsNotAdmin: InvalidAdminAccessToken => Some("ADMIN_ACCESS_TOKEN_IS_NOT_ADMIN"),
    ProjectAuthenticationRequired: ProjectAuthenticationError => None,
    ClientAuthenticationRequired: ProjectAuthenticationRequired => Some("CLIENT_AUTHENTICATION_REQUIRED"),
    ServerAuthenticationRequired: ProjectAuthenticationRequired => Some("SERVER_AUTHENTICATION_REQUIRED"),
    ClientOrServerAuthenticationRequired: ProjectAuthenticationRequired => Some("CLIENT_OR_SERVER_AUTHENTICATION_REQUIRED"),
    AdminAuthenticationRequired: ProjectAuthenticationRequired => Some("ADMIN_AUTHENTICATION_REQUIRED"),
    ExpectedInternalProject: ProjectAuthenticationError => Some("EXPECTED_INTERNAL_PROJECT"),

    SessionAuthenticationError: KnownError => None,
    InvalidSessionAuthentication: SessionAuthenticationError => None,
    InvalidAccessToken: InvalidSessionAuthentication => None,
    UnparsableAccessToken: InvalidAccessToken => Some("UNPARSABLE_ACCESS_TOKEN"),
    AccessTokenExpired: InvalidAccessToken => Some("ACCESS_TOKEN_EXPIRED"),
    InvalidProjectForAccessToken: InvalidAccessToken => Some("INVALID_PROJECT_FOR_ACCESS_TOKEN"),
    RefreshTokenError: SessionAuthenticationError => None,
    RefreshTokenNotFoundOrExpired: RefreshTokenError => Some("REFRESH_TOKEN_NOT_FOUND_OR_EXPIRED"),
    ProviderRejected: RefreshTokenError => Some("PROVIDER_REJECTED"),
    UserAuthenticationRequired: SessionAuthenticationError => Some("USER_AUTHENTICATION_REQUIRED"),
    CannotGetOwnUserWithoutUser: SessionAuthenticationError => Some("CANNOT_GET_OWN_USER_WITHOUT_USER"),

    ProjectNotFound: KnownError => Some("PROJECT_NOT_FOUND"),
    ApiKeyNotFound: KnownError => Some("API_KEY_NOT_FOUND"),
    UserNotFound: KnownError => Some("USER_NOT_FOUND"),
    UserIdDoesNotExist: KnownError => Some("USER_ID_DOES_NOT_EXIST"),
    UserEmailAlreadyExists: KnownError => Some("USER_EMAIL_ALREADY_EXISTS"),
    EmailPasswordMismatch: KnownError => Some("EMAIL_PASSWORD_MISMATCH"),
    PasswordAuthenticationNotEnabled: KnownError => Some("PASSWORD_AUTHENTICATION_NOT_ENABLED"),
    TeamNotFound: KnownError => Some("TEAM_NOT_FOUND"),
    ItemNotFound: KnownError => Some("ITEM_NOT_FOUND"),
}

/// The static description of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDeclaration {
    pub kind: KnownErrorKind,
    pub name: &'static str,
    /// Wire code; `None` for abstract kinds.
    pub code: Option<&'static str>,
    pub parent: Option<KnownErrorKind>,
}

impl KnownErrorKind {
    /// The wire code of a concrete kind; `None` for abstract kinds.
    pub fn code(self) -> Option<&'static str> {
        self.declaration().code
    }

    /// The type-like name of the kind, e.g. `InvalidAccessToken`.
    pub fn name(self) -> &'static str {
        self.declaration().name
    }

    /// The direct parent of the kind.
    pub fn parent(self) -> Option<KnownErrorKind> {
        self.declaration().parent
    }

    /// Returns true for kinds that never appear on the wire.
    pub fn is_abstract(self) -> bool {
        self.code().is_none()
    }

    /// The kind itself followed by every ancestor, nearest first.
    pub fn ancestors(self) -> &'static [KnownErrorKind] {
        KnownErrorRegistry::global().ancestors(self)
    }

    /// Returns true if `self` is `other` or one of its descendants.
    pub fn is_a(self, other: KnownErrorKind) -> bool {
        self.ancestors().contains(&other)
    }

    /// Resolve a wire code to its concrete kind.
    pub fn from_code(code: &str) -> Option<KnownErrorKind> {
        KnownErrorRegistry::global().kind_for_code(code)
    }
}

impl fmt::Display for KnownErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors detected while building a registry. These are programming errors
/// in the taxonomy and abort initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("known error code {code} is declared by both {first} and {second}")]
    DuplicateCode {
        code: &'static str,
        first: KnownErrorKind,
        second: KnownErrorKind,
    },

    #[error("known error kind {kind} has parent {parent}, which is not registered")]
    MissingParent {
        kind: KnownErrorKind,
        parent: KnownErrorKind,
    },

    #[error("known error kind {kind} is its own ancestor")]
    Cycle { kind: KnownErrorKind },

    #[error("known error kinds {first} and {second} both have no parent")]
    MultipleRoots {
        first: KnownErrorKind,
        second: KnownErrorKind,
    },
}

/// Lookup tables derived once from the kind declarations.
#[derive(Debug)]
pub struct KnownErrorRegistry {
    by_code: HashMap<&'static str, KnownErrorKind>,
    ancestors: HashMap<KnownErrorKind, Vec<KnownErrorKind>>,
}

static GLOBAL: LazyLock<KnownErrorRegistry> = LazyLock::new(|| {
    let declarations: Vec<KindDeclaration> = KnownErrorKind::ALL
        .iter()
        .map(|kind| kind.declaration())
        .collect();
    match KnownErrorRegistry::build(&declarations) {
        Ok(registry) => registry,
        Err(e) => panic!("invalid known error taxonomy: {e}"),
    }
});

impl KnownErrorRegistry {
    /// Build a registry from declarations, checking that every concrete code
    /// is unique, every parent is declared and exactly one kind is the root.
    pub fn build(declarations: &[KindDeclaration]) -> Result<Self, RegistryError> {
        let mut roots = declarations
            .iter()
            .filter(|decl| decl.parent.is_none())
            .map(|decl| decl.kind);
        if let (Some(first), Some(second)) = (roots.next(), roots.next()) {
            return Err(RegistryError::MultipleRoots { first, second });
        }

        let parents: HashMap<KnownErrorKind, Option<KnownErrorKind>> = declarations
            .iter()
            .map(|decl| (decl.kind, decl.parent))
            .collect();

        let mut by_code = HashMap::new();
        let mut ancestors = HashMap::new();

        for decl in declarations {
            if let Some(code) = decl.code
                && let Some(first) = by_code.insert(code, decl.kind)
            {
                return Err(RegistryError::DuplicateCode {
                    code,
                    first,
                    second: decl.kind,
                });
            }

            let mut chain = vec![decl.kind];
            let mut current = decl.parent;
            while let Some(parent) = current {
                if chain.contains(&parent) {
                    return Err(RegistryError::Cycle { kind: decl.kind });
                }
                let Some(grandparent) = parents.get(&parent) else {
                    return Err(RegistryError::MissingParent {
                        kind: decl.kind,
                        parent,
                    });
                };
                chain.push(parent);
                current = *grandparent;
            }
            ancestors.insert(decl.kind, chain);
        }

        tracing::debug!(
            kinds = declarations.len(),
            codes = by_code.len(),
            "known error registry built"
        );
        Ok(Self { by_code, ancestors })
    }

    /// The process-wide registry of all declared kinds.
    ///
    /// The first call validates the taxonomy; an invalid taxonomy panics.
    pub fn global() -> &'static KnownErrorRegistry {
        &GLOBAL
    }

    /// Resolve a wire code to its concrete kind.
    pub fn kind_for_code(&self, code: &str) -> Option<KnownErrorKind> {
        self.by_code.get(code).copied()
    }

    /// The kind followed by its ancestors, nearest first.
    pub fn ancestors(&self, kind: KnownErrorKind) -> &[KnownErrorKind] {
        self.ancestors.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All concrete kinds, sorted by wire code.
    pub fn concrete_kinds(&self) -> Vec<KnownErrorKind> {
        let mut kinds: Vec<_> = self.by_code.values().copied().collect();
        kinds.sort_by_key(|kind| kind.code());
        kinds
    }
}

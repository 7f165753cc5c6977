pub mod cipher;
pub mod email;
pub mod error;
pub mod invitation;
pub mod jwt;
pub mod mfa;
pub mod password;
pub mod service;
pub mod team;
pub mod two_factor;

pub use cipher::SecretCipher;
pub use email::{EmailLimitConfig, EmailLimitMonitor, EmailService, MailDispatcher, Mailer};
pub use error::{AuthError, Result};
pub use invitation::InvitationService;
pub use jwt::{hash_token, Claims, JwtService, TokenSubject, TokenType};
pub use password::PasswordHasher;
pub use service::{
    AccountOverview, AuthResponse, AuthService, AuthTokens, LoginRequest, Principal,
    RefreshTokenRequest, RegisterCandidateRequest, RegisterCompanyRequest, SessionMeta,
    TwoFactorLoginRequest,
};
pub use team::TeamService;
pub use two_factor::{SecondFactorVerified, TwoFactorService};

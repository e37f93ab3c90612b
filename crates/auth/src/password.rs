use crate::token::AuthError;

/// bcrypt password hashing with a fixed work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plain: &str) -> Result<String, AuthError> {
        Ok(bcrypt::hash(plain, self.cost)?)
    }

    /// `Ok(false)` for a wrong password; `Err` only if `hashed` is malformed.
    pub fn verify(&self, plain: &str, hashed: &str) -> Result<bool, AuthError> {
        Ok(bcrypt::verify(plain, hashed)?)
    }
}

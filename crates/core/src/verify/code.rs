use rand::Rng;

/// Issues one-time passcodes. A trait seam so tests can pin the code while
/// production draws from the thread RNG.
pub trait CodeGenerator: Send + Sync {
    /// Returns six ASCII digits in `[100000, 999999]`. Codes never carry a
    /// leading zero; the lower bound is part of the contract, not an
    /// implementation detail.
    fn generate(&self) -> String;
}

#[derive(Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{CodeGenerator, RandomCodeGenerator};

    #[test]
    fn generated_codes_stay_in_the_six_digit_window() {
        let generator = RandomCodeGenerator;

        for _ in 0..10_000 {
            let code = generator.generate();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|byte| byte.is_ascii_digit()));
            let value: u32 = code.parse().expect("code should be numeric");
            assert!((100_000..=999_999).contains(&value));
        }
    }
}

// [business] Print fresh key material for a new deployment's .env
fn main() {
    print!("{}", playfit_auth::keygen::env_lines());
}

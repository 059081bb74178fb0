use diesel::ConnectionError;
use diesel::result::Error as DieselError;

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        R2D2(::r2d2::Error);
        Diesel(DieselError);
        Connection(ConnectionError);
    }

    errors {
        MissingSecret(var: String) {
            description("signing secret is not configured")
            display("signing secret `{}` is not configured", var)
        }
    }
}

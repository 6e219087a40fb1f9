// Adapted from the teacher's internal `ready!`-style helpers: a thin wrapper
// so call sites read like the blocking equivalent while staying poll-based.
macro_rules! ready {
    ($e:expr) => {
        match $e {
            std::task::Poll::Ready(v) => v,
            std::task::Poll::Pending => return std::task::Poll::Pending,
        }
    };
}

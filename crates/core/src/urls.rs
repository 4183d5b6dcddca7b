use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters `encodeURIComponent` leaves untouched.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn join_endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub fn movie_stream_url(base_url: &str, stream_path: &str, filename: &str) -> String {
    let encoded = utf8_percent_encode(filename, COMPONENT).to_string();
    format!("{}/{encoded}", join_endpoint(base_url, stream_path))
}

#[cfg(test)]
mod tests {
    use super::{join_endpoint, movie_stream_url};

    #[test]
    fn joins_without_doubled_slashes() {
        assert_eq!(
            join_endpoint("http://localhost:5000/", "/load"),
            "http://localhost:5000/load"
        );
        assert_eq!(
            join_endpoint("http://localhost:5000", "tv-power"),
            "http://localhost:5000/tv-power"
        );
    }

    #[test]
    fn movie_url_encodes_filename() {
        let url = movie_stream_url("http://localhost:5000", "/get-movie", "Le Roi & l'Oiseau (1980).mp4");
        assert_eq!(
            url,
            "http://localhost:5000/get-movie/Le%20Roi%20%26%20l'Oiseau%20(1980).mp4"
        );
    }
}

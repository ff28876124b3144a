// https://www.iana.org/assignments/http-status-codes/http-status-codes.xhtml

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(u16);

impl StatusCode {
    pub fn from_u16(v: u16) -> Option<Self> {
        if v < 100 || v >= 600 {
            None
        } else {
            Some(StatusCode(v))
        }
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.0)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.0)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    pub fn default_reason(&self) -> Option<&'static str> {
        Some(match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            426 => "Upgrade Required",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => return None,
        })
    }
}

macro_rules! status_consts {
    ($(($name:ident, $code:expr)),* $(,)?) => {
        impl StatusCode {
            $(pub const $name: StatusCode = StatusCode($code);)*
        }
    };
}

status_consts![
    (OK, 200),
    (CREATED, 201),
    (NO_CONTENT, 204),
    (MOVED_PERMANENTLY, 301),
    (FOUND, 302),
    (NOT_MODIFIED, 304),
    (BAD_REQUEST, 400),
    (UNAUTHORIZED, 401),
    (FORBIDDEN, 403),
    (NOT_FOUND, 404),
    (METHOD_NOT_ALLOWED, 405),
    (REQUEST_TIMEOUT, 408),
    (PAYLOAD_TOO_LARGE, 413),
    (INTERNAL_SERVER_ERROR, 500),
    (NOT_IMPLEMENTED, 501),
    (BAD_GATEWAY, 502),
    (SERVICE_UNAVAILABLE, 503),
    (GATEWAY_TIMEOUT, 504),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(StatusCode::from_u16(99).is_none());
        assert!(StatusCode::from_u16(600).is_none());
        assert!(StatusCode::from_u16(200).is_some());
    }

    #[test]
    fn classifies_by_range() {
        assert!(StatusCode::OK.is_success());
        assert!(StatusCode::NOT_FOUND.is_client_error());
        assert!(StatusCode::INTERNAL_SERVER_ERROR.is_server_error());
    }

    #[test]
    fn default_reason_matches_known_code() {
        assert_eq!(StatusCode::NOT_FOUND.default_reason(), Some("Not Found"));
        assert_eq!(StatusCode::from_u16(599).unwrap().default_reason(), None);
    }
}

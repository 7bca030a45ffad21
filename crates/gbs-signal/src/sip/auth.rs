// REGISTER Digest 鉴权
// 首次未携带凭证的注册回以 401 挑战（realm + 新鲜 nonce + 算法标识），
// 设备重试时校验 response 摘要：
//   HA1 = md5(username:realm:password)
//   HA2 = md5(METHOD:uri)
//   response = md5(HA1:nonce[:cnonce]:HA2)

use super::message::SipRequest;
use rand::Rng;
use std::collections::HashMap;

const DEFAULT_ALGORITHM: &str = "MD5";

/// 生成 WWW-Authenticate 挑战头部值
pub fn generate_challenge(realm: &str) -> String {
    format!(
        "Digest realm=\"{}\", nonce=\"{}\", opaque=\"\", stale=\"FALSE\", algorithm=\"{}\"",
        realm,
        generate_nonce(),
        DEFAULT_ALGORITHM
    )
}

/// 以时间与随机数生成 nonce
fn generate_nonce() -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let pad: u64 = rand::thread_rng().gen();
    format!("{:x}", md5::compute(format!("{}{}", now, pad)))
}

/// 校验请求携带的 Digest 凭证
///
/// 无 Authorization 头部、缺少必要字段或摘要不匹配均返回 false
pub fn authenticate(req: &SipRequest, password: &str) -> bool {
    let Some(auth_header) = req.header("Authorization") else {
        return false;
    };
    let Some(params) = parse_auth_header(auth_header) else {
        return false;
    };

    let (Some(username), Some(realm), Some(nonce), Some(uri), Some(response)) = (
        params.get("username"),
        params.get("realm"),
        params.get("nonce"),
        params.get("uri"),
        params.get("response"),
    ) else {
        return false;
    };

    let method = req.method.as_str().to_uppercase();
    let expected = compute_response(
        username,
        realm,
        password,
        &method,
        uri,
        nonce,
        params.get("cnonce").map(String::as_str),
    );

    expected == *response
}

/// 计算期望的 response 摘要
fn compute_response(
    username: &str,
    realm: &str,
    password: &str,
    method: &str,
    uri: &str,
    nonce: &str,
    cnonce: Option<&str>,
) -> String {
    let ha1 = format!("{:x}", md5::compute(format!("{}:{}:{}", username, realm, password)));
    let ha2 = format!("{:x}", md5::compute(format!("{}:{}", method, uri)));

    let kd = match cnonce {
        Some(cnonce) => format!("{}:{}:{}:{}", ha1, nonce, cnonce, ha2),
        None => format!("{}:{}:{}", ha1, nonce, ha2),
    };
    format!("{:x}", md5::compute(kd))
}

/// 解析 `Digest k="v", k2=v2` 形式的头部值为键值对
fn parse_auth_header(value: &str) -> Option<HashMap<String, String>> {
    let rest = value.strip_prefix("Digest ").unwrap_or(value);

    let mut map = HashMap::new();
    for part in rest.split(',') {
        let trimmed = part.trim();
        if let Some((key, val)) = trimmed.split_once('=') {
            let mut val = val.trim().to_string();
            if val.starts_with('"') && val.ends_with('"') && val.len() >= 2 {
                val = val[1..val.len() - 1].to_string();
            }
            map.insert(key.trim().to_string(), val);
        }
    }

    (!map.is_empty()).then_some(map)
}

/// 构造 Authorization 头部值（测试中模拟设备侧）
pub fn build_authorization(
    username: &str,
    realm: &str,
    password: &str,
    method: &str,
    uri: &str,
    nonce: &str,
) -> String {
    let response = compute_response(
        username,
        realm,
        password,
        &method.to_uppercase(),
        uri,
        nonce,
        None,
    );
    format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm=MD5",
        username, realm, nonce, uri, response
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sip::message::SipMethod;

    fn register_request(auth: Option<String>) -> SipRequest {
        let mut req = SipRequest::new(
            SipMethod::Register,
            "sip:34020000002000000001@3402000000".to_string(),
        );
        if let Some(auth) = auth {
            req.add_header("Authorization", auth);
        }
        req
    }

    #[test]
    fn test_missing_authorization_rejected() {
        let req = register_request(None);
        assert!(!authenticate(&req, "12345678"));
    }

    #[test]
    fn test_valid_digest_accepted() {
        let auth = build_authorization(
            "34020000001320000001",
            "3402000000",
            "12345678",
            "REGISTER",
            "sip:34020000002000000001@3402000000",
            "abcdef0123456789",
        );
        let req = register_request(Some(auth));
        assert!(authenticate(&req, "12345678"));
    }

    #[test]
    fn test_any_field_change_flips_result() {
        let username = "34020000001320000001";
        let realm = "3402000000";
        let uri = "sip:34020000002000000001@3402000000";
        let nonce = "abcdef0123456789";
        let auth = build_authorization(username, realm, "12345678", "REGISTER", uri, nonce);

        // 错误密码
        let req = register_request(Some(auth.clone()));
        assert!(!authenticate(&req, "wrong"));

        // 篡改 nonce
        let req = register_request(Some(auth.replace(nonce, "ffffffffffffffff")));
        assert!(!authenticate(&req, "12345678"));

        // 篡改 uri
        let req = register_request(Some(auth.replace(uri, "sip:other@3402000000")));
        assert!(!authenticate(&req, "12345678"));
    }

    #[test]
    fn test_method_case_insensitive() {
        // 摘要按大写方法名计算，设备侧无论大小写结果一致
        let a = compute_response("u", "r", "p", "REGISTER", "sip:x@y", "n", None);
        let b = compute_response(
            "u",
            "r",
            "p",
            &"register".to_uppercase(),
            "sip:x@y",
            "n",
            None,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_cnonce_participates() {
        let without = compute_response("u", "r", "p", "REGISTER", "sip:x@y", "n", None);
        let with = compute_response("u", "r", "p", "REGISTER", "sip:x@y", "n", Some("c1"));
        assert_ne!(without, with);
    }

    #[test]
    fn test_challenge_shape() {
        let challenge = generate_challenge("3402000000");
        assert!(challenge.starts_with("Digest realm=\"3402000000\""));
        assert!(challenge.contains("nonce=\""));
        assert!(challenge.contains("algorithm=\"MD5\""));
    }
}
